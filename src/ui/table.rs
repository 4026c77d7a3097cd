use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
pub struct StepRow {
    #[tabled(rename = "Step")]
    pub step: usize,
    #[tabled(rename = "Model")]
    pub model: String,
    #[tabled(rename = "Depends on")]
    pub depends_on: String,
    #[tabled(rename = "Migration")]
    pub migration: String,
}

#[derive(Tabled)]
pub struct EdgeRow {
    #[tabled(rename = "Model")]
    pub model: String,
    #[tabled(rename = "References")]
    pub references: String,
    #[tabled(rename = "Referenced by")]
    pub referenced_by: String,
}

pub fn render_table<R: Tabled>(rows: &[R]) -> String {
    if rows.is_empty() {
        return String::new();
    }

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Join names for a table cell, `-` when there are none
pub fn name_list<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    let joined = names.into_iter().collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        "-".to_string()
    } else {
        joined
    }
}
