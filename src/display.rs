use crate::report::Report;
use colored::{ColoredString, Colorize};
use sagewatch_utils::{format_cost, format_running_time};

/// Table formatting utilities
///
/// Widths are measured on plain text; colour is applied after padding so
/// escape codes never skew the alignment.
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    footer: Option<Vec<String>>,
    max_widths: Vec<usize>,
    styler: Option<(usize, fn(&str) -> ColoredString)>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        let max_widths = headers.iter().map(|h| h.chars().count()).collect();
        Self {
            headers,
            rows: Vec::new(),
            footer: None,
            max_widths,
            styler: None,
        }
    }

    /// Style every body cell of `column` with `style`.
    pub fn style_column(&mut self, column: usize, style: fn(&str) -> ColoredString) {
        self.styler = Some((column, style));
    }

    pub fn add_row(&mut self, row: Vec<String>) {
        self.track_widths(&row);
        self.rows.push(row);
    }

    pub fn set_footer(&mut self, row: Vec<String>) {
        self.track_widths(&row);
        self.footer = Some(row);
    }

    fn track_widths(&mut self, row: &[String]) {
        for (i, cell) in row.iter().enumerate() {
            if i < self.max_widths.len() {
                self.max_widths[i] = self.max_widths[i].max(cell.chars().count());
            }
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.separator('┌', '┬', '┐'));
        out.push_str(&self.header_line());
        out.push_str(&self.separator('├', '┼', '┤'));

        for row in &self.rows {
            out.push_str(&self.row_line(row, true));
        }

        if let Some(footer) = &self.footer {
            out.push_str(&self.separator('├', '┼', '┤'));
            out.push_str(&self.row_line(footer, false));
        }

        out.push_str(&self.separator('└', '┴', '┘'));
        out
    }

    fn separator(&self, left: char, middle: char, right: char) -> String {
        let mut line = String::new();
        line.push(left);
        for (i, &width) in self.max_widths.iter().enumerate() {
            line.push_str(&"─".repeat(width + 2));
            if i < self.max_widths.len() - 1 {
                line.push(middle);
            }
        }
        line.push(right);
        line.push('\n');
        line
    }

    fn header_line(&self) -> String {
        let mut line = String::from("│");
        for (i, header) in self.headers.iter().enumerate() {
            let padded = pad(header, self.max_widths[i]);
            line.push_str(&format!(" {} │", padded.bold()));
        }
        line.push('\n');
        line
    }

    fn row_line(&self, row: &[String], styled: bool) -> String {
        let mut line = String::from("│");
        for (i, cell) in row.iter().enumerate() {
            let width = self.max_widths.get(i).copied().unwrap_or(0);
            let padded = pad(cell, width);
            let rendered = match self.styler {
                Some((column, style)) if styled && column == i => style(&padded).to_string(),
                _ => padded,
            };
            line.push_str(&format!(" {} │", rendered));
        }
        line.push('\n');
        line
    }
}

fn pad(cell: &str, width: usize) -> String {
    let len = cell.chars().count();
    format!("{}{}", cell, " ".repeat(width.saturating_sub(len)))
}

/// Colour for a lifecycle status
pub fn style_status(status: &str) -> ColoredString {
    match status.trim() {
        "InService" => status.green(),
        "Stopped" => status.yellow(),
        "Failed" | "Deleting" => status.red(),
        _ => status.normal(),
    }
}

const HEADERS: [&str; 9] = [
    "Type", "Name", "Status", "Instance", "Running", "$/hr", "Current", "Monthly", "Storage",
];
const STATUS_COLUMN: usize = 2;

/// Render the resource table with a totals footer.
pub fn render_table(report: &Report) -> String {
    let mut table = Table::new(HEADERS.iter().map(|h| h.to_string()).collect());
    table.style_column(STATUS_COLUMN, style_status);

    for row in &report.rows {
        let record = &row.record;
        let cost = &row.cost;

        let instance = if record.instance_count > 1 {
            format!("{} x{}", record.instance_type, record.instance_count)
        } else {
            record.instance_type.clone()
        };

        let storage = match (cost.storage_size_gb, cost.storage_cost) {
            (Some(size), Some(monthly)) => format!("{}GB {}/mo", size, format_cost(monthly)),
            _ => "-".to_string(),
        };

        table.add_row(vec![
            record.kind.to_string(),
            record.display_name(),
            record.status.clone(),
            instance,
            format_running_time(cost.running_time),
            format_cost(cost.hourly_rate),
            format_cost(cost.current_cost),
            format_cost(cost.projected_monthly_cost),
            storage,
        ]);
    }

    let totals = &report.totals;
    table.set_footer(vec![
        "Total".to_string(),
        format!("{} resources", report.rows.len()),
        String::new(),
        String::new(),
        String::new(),
        format_cost(totals.hourly_rate),
        format_cost(totals.current_cost),
        format_cost(totals.projected_monthly_cost),
        format!("{}/mo", format_cost(totals.storage_cost)),
    ]);

    table.render()
}

/// Report as terminal text. Without rows this is a single notice that says
/// whether the listing was complete.
pub fn render_report(report: &Report) -> String {
    if report.is_empty() {
        let notice = if report.is_complete() {
            report.empty_message().yellow()
        } else {
            report.empty_message().red().bold()
        };
        return format!("{} (region {})\n", notice, report.region);
    }

    format!(
        "{} {}\n{}",
        "SageMaker resources in".bold(),
        report.region.bold().cyan(),
        render_table(report)
    )
}

/// Status messages
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message.red());
}

pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message);
}
