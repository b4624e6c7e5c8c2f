use crate::codec::Codec;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Tabled)]
pub struct FormatRow {
    #[tabled(rename = "Format")]
    pub format: String,
    #[tabled(rename = "Extensions")]
    pub extensions: String,
    #[tabled(rename = "Structure")]
    pub structure: String,
    #[tabled(rename = "Description")]
    pub description: String,
}

impl FormatRow {
    pub fn from_codec(codec: &dyn Codec) -> Self {
        Self {
            format: codec.format_name().to_string(),
            extensions: codec
                .file_extensions()
                .iter()
                .map(|e| format!(".{}", e))
                .collect::<Vec<_>>()
                .join(" "),
            structure: if codec.supports_structure() { "yes" } else { "raw only" }.to_string(),
            description: codec.description().to_string(),
        }
    }
}

#[derive(Default)]
pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }
        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

pub fn stats_table(stats: &[(&str, &str)]) -> String {
    let mut builder = TableBuilder::new();
    for (label, value) in stats {
        builder.add_row(label, value);
    }
    builder.build()
}

pub fn formats_table(codecs: &[Box<dyn Codec>]) -> String {
    let mut rows: Vec<FormatRow> = codecs.iter().map(|c| FormatRow::from_codec(c.as_ref())).collect();
    rows.sort_by(|a, b| a.format.cmp(&b.format));
    Table::new(&rows).with(Style::rounded()).to_string()
}
