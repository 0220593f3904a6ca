use anyhow::{anyhow, bail, Result};
use tracing::debug;

use sitelog_core::cache::QueryKey;
use sitelog_core::models::{DailyEntry, ProjectInput, ProjectStatus, Role, UserInput};
use sitelog_core::utils::{extract_number, is_valid_month, parse_date, today};
use sitelog_core::{CacheError, EditedEntries, SaveError};

use crate::app::App;
use crate::output;
use crate::{AdminCommand, Command};

const SIGN_IN_AGAIN: &str = "Your session has expired. Run `sitelog login` to sign in again.";

/// Parse `WORK:day,night,midnight[,progress]`. Missing counts are zero.
pub fn parse_entry_arg(arg: &str) -> Result<(String, DailyEntry), String> {
    let (work_type, counts) = arg
        .rsplit_once(':')
        .ok_or_else(|| format!("expected WORK:day,night,midnight[,progress], got '{}'", arg))?;
    let work_type = work_type.trim();
    if work_type.is_empty() {
        return Err("work type name is empty".to_string());
    }

    let fields: Vec<&str> = counts.split(',').map(str::trim).collect();
    if fields.len() > 4 {
        return Err(format!("too many values for {}: '{}'", work_type, counts));
    }
    let shift = |i: usize| -> Result<u32, String> {
        match fields.get(i).copied().filter(|s| !s.is_empty()) {
            Some(s) => s
                .parse()
                .map_err(|_| format!("worker count '{}' for {} is not a whole number", s, work_type)),
            None => Ok(0),
        }
    };
    let progress = match fields.get(3).copied().filter(|s| !s.is_empty()) {
        Some(s) => s
            .trim_end_matches('%')
            .parse::<f64>()
            .map_err(|_| format!("progress '{}' for {} is not a number", s, work_type))?,
        None => 0.0,
    };

    Ok((
        work_type.to_string(),
        DailyEntry::new(shift(0)?, shift(1)?, shift(2)?, progress),
    ))
}

/// Won amount such as `150000`, `150,000` or `150,000원`.
pub fn parse_amount(arg: &str) -> Result<i64, String> {
    extract_number(arg).ok_or_else(|| format!("'{}' is not an amount", arg))
}

fn read_error(e: CacheError) -> anyhow::Error {
    match e {
        e if e.is_session_invalid() => anyhow!(SIGN_IN_AGAIN),
        CacheError::Fetch(api) => anyhow!(api.user_message()),
        other => anyhow!(other),
    }
}

fn save_error(e: SaveError) -> anyhow::Error {
    if e.is_session_invalid() {
        anyhow!("{} Nothing was saved.", SIGN_IN_AGAIN)
    } else {
        anyhow!(e.user_message())
    }
}

fn write_error(e: sitelog_core::ApiError) -> anyhow::Error {
    if e.is_session_invalid() {
        anyhow!(SIGN_IN_AGAIN)
    } else {
        anyhow!(e.user_message())
    }
}

fn check_date(date: &str) -> Result<()> {
    if parse_date(date).is_none() {
        bail!("Invalid date '{}', expected YYYY-MM-DD", date);
    }
    Ok(())
}

pub async fn run(app: &mut App, command: Command) -> Result<()> {
    debug!(?command, "Running command");
    match command {
        Command::Login {
            username,
            no_remember,
        } => {
            let user = app.login(username, !no_remember).await?;
            println!("Signed in.");
            output::user(&user);
        }
        Command::Logout => {
            app.logout();
            println!("Signed out.");
        }
        Command::Whoami => {
            app.require_login()?;
            let user = app.site.current_user().await.map_err(read_error)?;
            if app.json {
                output::json(&user)?;
            } else {
                output::user(&user);
                if let Some(left) = app.site.session().expires_in() {
                    println!(
                        "  Session expires in {}h {:02}m",
                        left.num_hours(),
                        left.num_minutes() % 60
                    );
                }
            }
        }
        Command::Projects => {
            app.require_login()?;
            let projects = app.site.visible_projects().await.map_err(read_error)?;
            if app.json {
                output::json(&projects)?;
            } else {
                output::projects(&projects);
            }
        }
        Command::Project { name } => {
            let user = app.require_login()?;
            let project = app.site.project(&name).await.map_err(read_error)?;
            if app.json {
                output::json(&project)?;
            } else {
                // Unit costs are admin-only
                let costs = if user.is_admin() {
                    app.site
                        .labor_costs()
                        .await
                        .map_err(|e| debug!(error = %e, "Labor costs unavailable"))
                        .ok()
                } else {
                    None
                };
                output::project(&project, costs.as_ref());
            }
        }
        Command::Summary { name, date } => {
            app.require_login()?;
            if let Some(date) = date.as_deref() {
                check_date(date)?;
            }
            let summary = app
                .site
                .summary(&name, date.as_deref())
                .await
                .map_err(read_error)?;
            if app.json {
                output::json(&summary)?;
            } else {
                let key = match date.as_deref() {
                    Some(date) => QueryKey::summary(&name, date),
                    None => QueryKey::latest_summary(&name),
                };
                let age = app
                    .site
                    .cache()
                    .entry(&key)
                    .map(|e| e.age_display())
                    .unwrap_or_else(|| "just now".to_string());
                output::summary(&name, date.as_deref(), &summary, &age);
            }
        }
        Command::Dates { name, month } => {
            app.require_login()?;
            if let Some(month) = month.as_deref() {
                if !is_valid_month(month) {
                    bail!("Invalid month '{}', expected YYYY-MM", month);
                }
            }
            let dates = app
                .site
                .dates_with_data(&name, month.as_deref())
                .await
                .map_err(read_error)?;
            if app.json {
                output::json(&dates)?;
            } else {
                output::dates(&dates);
            }
        }
        Command::Save {
            name,
            date,
            entries,
        } => {
            let user = app.require_login()?;
            if !user.can_access(&name) {
                bail!("{} is not assigned to project {}", user.username, name);
            }
            let date = date.unwrap_or_else(today);
            check_date(&date)?;

            let project = app.site.project(&name).await.map_err(read_error)?;
            if let Some((unknown, _)) = entries.iter().find(|(w, _)| !project.has_work_type(w)) {
                bail!(
                    "{} has no work type '{}'. Known: {}",
                    name,
                    unknown,
                    project.work_types.join(", ")
                );
            }

            // Load the current summary so the save can show its provisional totals
            if let Err(e) = app.site.summary(&name, Some(date.as_str())).await {
                debug!(error = %e, "No summary before save");
            }

            let edited: EditedEntries = entries.into_iter().collect();
            let receipt = app
                .site
                .save_daily(&name, &date, &edited)
                .await
                .map_err(save_error)?;
            output::receipt(&receipt);

            let summary = app
                .site
                .summary(&name, Some(date.as_str()))
                .await
                .map_err(read_error)?;
            output::summary(&name, Some(date.as_str()), &summary, "just now");
        }
        Command::AddWorkType {
            name,
            work_type,
            force,
        } => {
            app.require_admin()?;
            if !force {
                let similarity = app
                    .client
                    .work_type_similarity(&work_type)
                    .await
                    .map_err(write_error)?;
                if similarity.has_similarity {
                    bail!(
                        "Similar work types exist: {}. Use --force to add '{}' anyway.",
                        similarity.similar_types.join(", "),
                        work_type
                    );
                }
            }
            let ack = app
                .site
                .add_work_type(&name, &work_type)
                .await
                .map_err(write_error)?;
            println!("{}", ack.message.unwrap_or_else(|| format!("Added {}", work_type)));
        }
        Command::Admin(admin) => {
            app.require_admin()?;
            run_admin(app, admin).await?;
        }
        Command::Health => {
            let health = app.client.health().await.map_err(write_error)?;
            output::health(&health);
        }
    }
    Ok(())
}

async fn run_admin(app: &mut App, command: AdminCommand) -> Result<()> {
    match command {
        AdminCommand::Dashboard => {
            let rows = app.site.admin_dashboard().await.map_err(read_error)?;
            if app.json {
                output::json(&rows)?;
            } else {
                output::dashboard(&rows);
            }
        }
        AdminCommand::Users => {
            let users = app.site.users().await.map_err(read_error)?;
            if app.json {
                output::json(&users)?;
            } else {
                output::users(&users);
            }
        }
        AdminCommand::CreateUser {
            username,
            admin,
            projects,
        } => {
            let password = rpassword::prompt_password(format!("Password for {}: ", username))?;
            if password.is_empty() {
                bail!("Password required");
            }
            let input = UserInput {
                username: Some(username.clone()),
                password: Some(password),
                role: Some(if admin { Role::Admin } else { Role::User }),
                projects: Some(projects),
                status: Some("active".to_string()),
            };
            app.site.create_user(&input).await.map_err(write_error)?;
            println!("Created user {}.", username);
        }
        AdminCommand::AssignProjects { username, projects } => {
            let input = UserInput {
                projects: Some(projects),
                ..Default::default()
            };
            app.site
                .update_user(&username, &input)
                .await
                .map_err(write_error)?;
            println!("Updated projects for {}.", username);
        }
        AdminCommand::DeleteUser { username } => {
            app.site.delete_user(&username).await.map_err(write_error)?;
            println!("Deleted user {}.", username);
        }
        AdminCommand::CreateProject { name, work_types } => {
            let input = ProjectInput {
                project_name: Some(name.clone()),
                work_types,
                ..Default::default()
            };
            app.site.create_project(&input).await.map_err(write_error)?;
            println!("Created project {}.", name);
        }
        AdminCommand::SetStatus { name, status } => {
            let project = app.site.project(&name).await.map_err(read_error)?;
            let input = ProjectInput {
                project_name: None,
                work_types: project.work_types,
                contracts: project.contracts,
                companies: project.companies,
                status: Some(if status == "inactive" {
                    ProjectStatus::Inactive
                } else {
                    ProjectStatus::Active
                }),
            };
            app.site
                .update_project(&name, &input)
                .await
                .map_err(write_error)?;
            println!("{} is now {}.", name, status);
        }
        AdminCommand::DeleteProject { name } => {
            app.site.delete_project(&name).await.map_err(write_error)?;
            println!("Deleted project {}.", name);
        }
        AdminCommand::LaborCosts => {
            let costs = app.site.labor_costs().await.map_err(read_error)?;
            if app.json {
                output::json(&costs)?;
            } else {
                output::labor_costs(&costs);
                let work_types = app.site.available_work_types().await.map_err(read_error)?;
                let unpriced: Vec<&str> = work_types
                    .iter()
                    .map(String::as_str)
                    .filter(|w| !costs.contains_key(*w))
                    .collect();
                if !unpriced.is_empty() {
                    println!();
                    println!("No costs set for: {}", unpriced.join(", "));
                }
            }
        }
        AdminCommand::SetLaborCost {
            work_type,
            day,
            night,
            midnight,
        } => {
            if day < 0 || night < 0 || midnight < 0 {
                bail!("Labor costs cannot be negative");
            }
            app.site
                .save_labor_cost(&work_type, day, night, midnight)
                .await
                .map_err(write_error)?;
            println!("Saved labor costs for {}.", work_type);
        }
        AdminCommand::Report { name } => {
            let rows = app.site.work_summary(&name).await.map_err(read_error)?;
            if app.json {
                output::json(&rows)?;
            } else {
                output::report(&name, &rows);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_entry() {
        let (work_type, entry) = parse_entry_arg("Concrete:5,2,0,40.5").unwrap();
        assert_eq!(work_type, "Concrete");
        assert_eq!(entry, DailyEntry::new(5, 2, 0, 40.5));
    }

    #[test]
    fn test_parse_partial_entry() {
        let (_, entry) = parse_entry_arg("Rebar:3").unwrap();
        assert_eq!(entry, DailyEntry::new(3, 0, 0, 0.0));

        let (_, entry) = parse_entry_arg("Rebar:,1,,25%").unwrap();
        assert_eq!(entry, DailyEntry::new(0, 1, 0, 25.0));
    }

    #[test]
    fn test_parse_work_type_with_colon() {
        let (work_type, entry) = parse_entry_arg("Phase 2: Steel:1,1,1").unwrap();
        assert_eq!(work_type, "Phase 2: Steel");
        assert_eq!(entry.workers(), 3);
    }

    #[test]
    fn test_parse_amount_accepts_separators_and_unit() {
        assert_eq!(parse_amount("150000"), Ok(150000));
        assert_eq!(parse_amount("150,000원"), Ok(150000));
        assert!(parse_amount("free").is_err());
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_entry_arg("Concrete").is_err());
        assert!(parse_entry_arg(":1,2,3").is_err());
        assert!(parse_entry_arg("Concrete:-1").is_err());
        assert!(parse_entry_arg("Concrete:a,b").is_err());
        assert!(parse_entry_arg("Concrete:1,2,3,4,5").is_err());
        assert!(parse_entry_arg("Concrete:1,0,0,lots").is_err());
    }
}
