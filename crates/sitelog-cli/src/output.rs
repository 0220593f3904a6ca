//! Plain-text rendering of command results.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::Serialize;

use sitelog_core::models::{
    DashboardRow, HealthCheck, LaborCost, Project, Summary, User, UserRecord, WorkTypeReportRow,
};
use sitelog_core::utils::{
    format_currency, format_date, format_number, format_optional, format_percent, truncate,
};
use sitelog_core::SaveReceipt;

const NAME_WIDTH: usize = 24;

pub fn json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn count(n: u64) -> String {
    format_number(i64::try_from(n).unwrap_or(i64::MAX))
}

pub fn user(user: &User) {
    println!("{} ({})", user.username, user.role);
    if !user.is_admin() {
        if user.projects.is_empty() {
            println!("  No projects assigned");
        } else {
            println!("  Projects: {}", user.projects.join(", "));
        }
    }
}

pub fn projects(projects: &BTreeMap<String, Project>) {
    if projects.is_empty() {
        println!("No projects.");
        return;
    }
    println!("{:<w$}  {:<8}  {:>10}  {}", "PROJECT", "STATUS", "WORK TYPES", "LAST ENTRY", w = NAME_WIDTH);
    for (name, project) in projects {
        println!(
            "{:<w$}  {:<8}  {:>10}  {}",
            truncate(name, NAME_WIDTH),
            project.status.to_string(),
            project.work_types.len(),
            project.most_recent_date().unwrap_or("-"),
            w = NAME_WIDTH
        );
    }
}

pub fn project(project: &Project, costs: Option<&BTreeMap<String, LaborCost>>) {
    println!("{} [{}]", project.name, project.status);
    if let Some(created) = project.created_date.as_deref() {
        println!("Created {}", format_date(created));
    }
    println!("Contract total: {}", format_currency(project.contract_total()));
    println!();

    println!("{:<w$}  {:<20}  {:>14}", "WORK TYPE", "COMPANY", "CONTRACT", w = NAME_WIDTH);
    for work_type in &project.work_types {
        println!(
            "{:<w$}  {:<20}  {:>14}",
            truncate(work_type, NAME_WIDTH),
            truncate(&format_optional(&project.companies.get(work_type).cloned(), "-"), 20),
            format_currency(project.contracts.get(work_type).copied().unwrap_or(0)),
            w = NAME_WIDTH
        );
    }

    if let Some(date) = project.most_recent_date() {
        println!();
        println!("Entries for {}:", date);
        daily_entries(project, date, costs);
    }
}

fn daily_entries(project: &Project, date: &str, costs: Option<&BTreeMap<String, LaborCost>>) {
    let Some(entries) = project.daily_data.get(date) else {
        return;
    };
    println!(
        "  {:<w$}  {:>5}  {:>5}  {:>8}  {:>6}  {:>8}  {:>12}",
        "WORK TYPE", "DAY", "NIGHT", "MIDNIGHT", "TOTAL", "PROGRESS", "COST",
        w = NAME_WIDTH
    );
    for (work_type, entry) in entries {
        let cost = costs
            .and_then(|c| c.get(work_type))
            .map(|rates| format_currency(rates.cost_of(entry)));
        println!(
            "  {:<w$}  {:>5}  {:>5}  {:>8}  {:>6}  {:>8}  {:>12}",
            truncate(work_type, NAME_WIDTH),
            entry.day,
            entry.night,
            entry.midnight,
            entry.total_or_sum(),
            format_percent(entry.progress),
            format_optional(&cost, "-"),
            w = NAME_WIDTH
        );
    }
}

pub fn summary(name: &str, date: Option<&str>, summary: &Summary, age: &str) {
    println!("{} - {}", name, date.map(format_date).unwrap_or_else(|| "latest".to_string()));
    println!("  Workers today:      {}", count(summary.totals.today));
    println!("  Workers cumulative: {}", count(summary.totals.cumulative));
    println!("  Progress:           {}", format_percent(summary.progress_rate()));
    println!("  Status:             {} ({})", summary.status_label(), summary.tier().label());
    println!("  Fetched {}", age);
}

pub fn dates(dates: &[String]) {
    if dates.is_empty() {
        println!("No entries.");
    }
    for date in dates {
        println!("{}", date);
    }
}

pub fn receipt(receipt: &SaveReceipt) {
    println!(
        "Saved {} entr{} for {} on {}.",
        receipt.saved_count,
        if receipt.saved_count == 1 { "y" } else { "ies" },
        receipt.project,
        receipt.date
    );
    if let Some(message) = receipt.message.as_deref() {
        println!("  {}", message);
    }
}

pub fn dashboard(rows: &[DashboardRow]) {
    if rows.is_empty() {
        println!("No projects.");
        return;
    }
    println!(
        "{:<w$}  {:<10}  {:>7}  {:>10}  {:>8}  {:>8}  {}",
        "PROJECT", "LAST ENTRY", "TODAY", "CUMULATIVE", "PROGRESS", "SCHEDULE", "STATUS",
        w = NAME_WIDTH
    );
    for row in rows {
        println!(
            "{:<w$}  {:<10}  {:>7}  {:>10}  {:>8}  {:>8}  {}",
            truncate(&row.project_name, NAME_WIDTH),
            format_optional(&row.recent_date, "-"),
            count(row.today_workers),
            count(row.cumulative_workers),
            format_percent(row.avg_progress),
            format_percent(row.schedule_rate),
            row.status,
            w = NAME_WIDTH
        );
    }
}

pub fn users(users: &BTreeMap<String, UserRecord>) {
    println!("{:<20}  {:<6}  {:<8}  {}", "USER", "ROLE", "STATUS", "PROJECTS");
    for (username, record) in users {
        println!(
            "{:<20}  {:<6}  {:<8}  {}",
            truncate(username, 20),
            record.role.to_string(),
            format_optional(&record.status, "active"),
            record.projects.join(", ")
        );
    }
}

pub fn labor_costs(costs: &BTreeMap<String, LaborCost>) {
    println!("{:<w$}  {:>12}  {:>12}  {:>12}", "WORK TYPE", "DAY", "NIGHT", "MIDNIGHT", w = NAME_WIDTH);
    for (work_type, cost) in costs {
        println!(
            "{:<w$}  {:>12}  {:>12}  {:>12}{}",
            truncate(work_type, NAME_WIDTH),
            format_currency(cost.day),
            format_currency(cost.night),
            format_currency(cost.midnight),
            if cost.locked { "  (locked)" } else { "" },
            w = NAME_WIDTH
        );
    }
}

pub fn report(name: &str, rows: &[WorkTypeReportRow]) {
    println!("{} - labor cost by work type", name);
    println!(
        "{:<w$}  {:>14}  {:>8}  {:>14}  {:>14}",
        "WORK TYPE", "CONTRACT", "WORKERS", "LABOR COST", "BALANCE",
        w = NAME_WIDTH
    );
    let mut total_cost = 0;
    for row in rows {
        total_cost += row.total_labor_cost;
        println!(
            "{:<w$}  {:>14}  {:>8}  {:>14}  {:>14}{}",
            truncate(&row.work_type, NAME_WIDTH),
            format_currency(row.contract_amount),
            count(row.total_workers),
            format_currency(row.total_labor_cost),
            format_currency(row.balance),
            if row.is_over_budget() { "  OVER" } else { "" },
            w = NAME_WIDTH
        );
    }
    println!("Total labor cost: {}", format_currency(total_cost));
}

pub fn health(health: &HealthCheck) {
    println!("{} {} - {}", health.service, health.version, health.status);
}
