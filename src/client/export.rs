use chrono::NaiveDate;

use crate::data::profile::Profile;

pub static NO_CLASS_GROUP: &str = "N/A";

/// One spreadsheet row per cached profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    #[serde(rename = "Student Name")]
    pub student_name: String,
    #[serde(rename = "Student ID")]
    pub student_id: String,
    #[serde(rename = "Class/Group")]
    pub class_group: String,
    #[serde(rename = "Date Added")]
    pub date_added: String,
}

impl From<&Profile> for ExportRow {
    fn from(p: &Profile) -> Self {
        ExportRow {
            student_name: p.name.clone().unwrap_or_default(),
            student_id: p.student_id.clone(),
            class_group: p
                .class_group
                .clone()
                .unwrap_or_else(|| NO_CLASS_GROUP.to_string()),
            date_added: p
                .created_at
                .map(|at| at.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        }
    }
}

pub fn rows(profiles: &[Profile]) -> Vec<ExportRow> {
    profiles.iter().map(ExportRow::from).collect()
}

pub fn file_name(date: NaiveDate) -> String {
    format!("PlayerProfiles_{}.xlsx", date.format("%Y-%m-%d"))
}

pub fn to_csv(rows: &[ExportRow]) -> String {
    let mut out = String::from("Student Name,Student ID,Class/Group,Date Added\n");
    for row in rows {
        let fields = [
            &row.student_name,
            &row.student_id,
            &row.class_group,
            &row.date_added,
        ];
        let line: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
