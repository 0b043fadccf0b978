//! Static description of every table. Field names that reach the store are
//! checked against these column lists, the PostgreSQL DDL is rendered from
//! them, and the in-memory store enforces the same constraints.

pub const ID: &str = "id";
pub const UPDATED_AT: &str = "updated_at";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnDefault {
    None,
    Text(&'static str),
    Int(i64),
    Bool(bool),
    Now,
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub sql_type: &'static str,
    pub default: ColumnDefault,
    pub not_null: bool,
    pub unique: bool,
    pub references: Option<&'static str>,
}

impl Column {
    const fn new(name: &'static str, sql_type: &'static str) -> Self {
        Self {
            name,
            sql_type,
            default: ColumnDefault::None,
            not_null: false,
            unique: false,
            references: None,
        }
    }

    const fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    const fn default(mut self, default: ColumnDefault) -> Self {
        self.default = default;
        self
    }

    const fn references(mut self, table: &'static str) -> Self {
        self.references = Some(table);
        self
    }

    fn ddl(&self) -> String {
        let mut ddl = format!("{} {}", self.name, self.sql_type);
        if self.not_null {
            ddl.push_str(" NOT NULL");
        }
        if self.unique {
            ddl.push_str(" UNIQUE");
        }
        match self.default {
            ColumnDefault::None => {}
            ColumnDefault::Text(s) => ddl.push_str(&format!(" DEFAULT '{}'", s.replace('\'', "''"))),
            ColumnDefault::Int(i) => ddl.push_str(&format!(" DEFAULT {i}")),
            ColumnDefault::Bool(b) => ddl.push_str(&format!(" DEFAULT {b}")),
            ColumnDefault::Now => ddl.push_str(" DEFAULT now()"),
        }
        if let Some(table) = self.references {
            ddl.push_str(&format!(" REFERENCES {table}(id)"));
        }
        ddl
    }
}

/// A row rule spanning one or two columns. NULL operands satisfy it, as
/// they do a PostgreSQL CHECK.
#[derive(Debug, Clone, Copy)]
pub enum Check {
    NonNegative(&'static str),
    AtMost {
        column: &'static str,
        limit: &'static str,
    },
}

impl Check {
    pub fn name(&self, table: &str) -> String {
        match self {
            Check::NonNegative(column) => format!("{table}_{column}_check"),
            Check::AtMost { column, .. } => format!("{table}_{column}_limit_check"),
        }
    }

    fn expression(&self) -> String {
        match self {
            Check::NonNegative(column) => format!("{column} >= 0"),
            Check::AtMost { column, limit } => format!("{limit} IS NULL OR {column} <= {limit}"),
        }
    }
}

#[derive(Debug)]
pub struct TableDef {
    pub name: &'static str,
    /// Every column except `id`.
    pub columns: &'static [Column],
    pub checks: &'static [Check],
}

impl TableDef {
    pub fn column(&self, name: &str) -> Option<&'static Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn create_statement(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(Column::ddl)
            .chain(self.checks.iter().map(|check| {
                format!(
                    "CONSTRAINT {} CHECK ({})",
                    check.name(self.name),
                    check.expression()
                )
            }))
            .collect::<Vec<_>>()
            .join(",\n    ");
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    id SERIAL PRIMARY KEY,\n    {}\n)",
            self.name, columns
        )
    }
}

const fn updated_at() -> Column {
    Column::new(UPDATED_AT, "TIMESTAMPTZ")
        .not_null()
        .default(ColumnDefault::Now)
}

pub const DEFAULT_AUTHOR: &str = "管理员";

pub static MEMBERS: TableDef = TableDef {
    name: "members",
    columns: &[
        Column::new("name", "VARCHAR(100)").not_null(),
        Column::new("email", "VARCHAR(255)").not_null().unique(),
        Column::new("phone", "VARCHAR(20)"),
        Column::new("graduation_year", "INTEGER"),
        Column::new("school", "VARCHAR(100)"),
        Column::new("membership_type", "VARCHAR(50)").default(ColumnDefault::Text("regular")),
        Column::new("status", "VARCHAR(20)").default(ColumnDefault::Text("pending")),
        Column::new("created_at", "TIMESTAMPTZ").not_null().default(ColumnDefault::Now),
        updated_at(),
    ],
    checks: &[],
};

pub static EVENTS: TableDef = TableDef {
    name: "events",
    columns: &[
        Column::new("title", "VARCHAR(200)").not_null(),
        Column::new("description", "TEXT"),
        Column::new("event_date", "DATE").not_null(),
        Column::new("event_time", "TIME"),
        Column::new("location", "VARCHAR(200)"),
        Column::new("category", "VARCHAR(50)"),
        Column::new("max_participants", "INTEGER"),
        Column::new("current_participants", "INTEGER")
            .not_null()
            .default(ColumnDefault::Int(0)),
        Column::new("registration_open", "BOOLEAN")
            .not_null()
            .default(ColumnDefault::Bool(true)),
        Column::new("status", "VARCHAR(20)").default(ColumnDefault::Text("upcoming")),
        Column::new("created_at", "TIMESTAMPTZ").not_null().default(ColumnDefault::Now),
        updated_at(),
    ],
    checks: &[
        Check::NonNegative("max_participants"),
        Check::NonNegative("current_participants"),
        Check::AtMost {
            column: "current_participants",
            limit: "max_participants",
        },
    ],
};

pub static EVENT_REGISTRATIONS: TableDef = TableDef {
    name: "event_registrations",
    columns: &[
        Column::new("event_id", "INTEGER").references("events"),
        Column::new("registration_number", "VARCHAR(50)").unique(),
        Column::new("participant_name", "VARCHAR(100)").not_null(),
        Column::new("participant_email", "VARCHAR(255)").not_null(),
        Column::new("participant_phone", "VARCHAR(20)"),
        Column::new("special_requirements", "TEXT"),
        Column::new("registered_at", "TIMESTAMPTZ").not_null().default(ColumnDefault::Now),
        updated_at(),
    ],
    checks: &[],
};

pub static NEWS: TableDef = TableDef {
    name: "news",
    columns: &[
        Column::new("title", "VARCHAR(200)").not_null(),
        Column::new("content", "TEXT"),
        Column::new("author", "VARCHAR(100)").default(ColumnDefault::Text(DEFAULT_AUTHOR)),
        Column::new("category", "VARCHAR(50)"),
        Column::new("featured", "BOOLEAN").not_null().default(ColumnDefault::Bool(false)),
        Column::new("published", "BOOLEAN").not_null().default(ColumnDefault::Bool(false)),
        Column::new("views", "INTEGER").not_null().default(ColumnDefault::Int(0)),
        Column::new("publish_date", "DATE"),
        Column::new("created_at", "TIMESTAMPTZ").not_null().default(ColumnDefault::Now),
        updated_at(),
    ],
    checks: &[],
};

pub static SCHOLARSHIPS: TableDef = TableDef {
    name: "scholarships",
    columns: &[
        Column::new("title", "VARCHAR(200)").not_null(),
        Column::new("description", "TEXT"),
        Column::new("amount", "NUMERIC(10,2)"),
        Column::new("type", "VARCHAR(50)"),
        Column::new("requirements", "TEXT"),
        Column::new("deadline", "DATE"),
        Column::new("status", "VARCHAR(20)").default(ColumnDefault::Text("open")),
        Column::new("created_at", "TIMESTAMPTZ").not_null().default(ColumnDefault::Now),
        updated_at(),
    ],
    checks: &[],
};

pub static SCHOLARSHIP_APPLICATIONS: TableDef = TableDef {
    name: "scholarship_applications",
    columns: &[
        Column::new("scholarship_id", "INTEGER").references("scholarships"),
        Column::new("applicant_name", "VARCHAR(100)").not_null(),
        Column::new("applicant_email", "VARCHAR(255)").not_null(),
        Column::new("applicant_phone", "VARCHAR(20)"),
        Column::new("school", "VARCHAR(100)"),
        Column::new("graduation_year", "INTEGER"),
        Column::new("gpa", "NUMERIC(3,2)"),
        Column::new("transcript_file", "VARCHAR(255)"),
        Column::new("recommendation_file", "VARCHAR(255)"),
        Column::new("income_proof_file", "VARCHAR(255)"),
        Column::new("essay", "TEXT"),
        Column::new("status", "VARCHAR(20)").default(ColumnDefault::Text("pending")),
        Column::new("submitted_at", "TIMESTAMPTZ").not_null().default(ColumnDefault::Now),
        Column::new("reviewed_at", "TIMESTAMPTZ"),
        updated_at(),
    ],
    checks: &[],
};

pub static CONTACT_MESSAGES: TableDef = TableDef {
    name: "contact_messages",
    columns: &[
        Column::new("name", "VARCHAR(100)").not_null(),
        Column::new("email", "VARCHAR(255)").not_null(),
        Column::new("phone", "VARCHAR(20)"),
        Column::new("subject", "VARCHAR(200)"),
        Column::new("message", "TEXT").not_null(),
        Column::new("status", "VARCHAR(20)").default(ColumnDefault::Text("new")),
        Column::new("created_at", "TIMESTAMPTZ").not_null().default(ColumnDefault::Now),
        Column::new("replied_at", "TIMESTAMPTZ"),
        updated_at(),
    ],
    checks: &[],
};

/// In dependency order: referenced tables come first.
pub static TABLES: &[&TableDef] = &[
    &MEMBERS,
    &EVENTS,
    &EVENT_REGISTRATIONS,
    &NEWS,
    &SCHOLARSHIPS,
    &SCHOLARSHIP_APPLICATIONS,
    &CONTACT_MESSAGES,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_names_are_plain_identifiers() {
        for table in TABLES {
            for column in table.columns {
                assert!(
                    column
                        .name
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'),
                    "{}.{}",
                    table.name,
                    column.name
                );
            }
        }
    }

    #[test]
    fn references_point_at_earlier_tables() {
        for (i, table) in TABLES.iter().enumerate() {
            for target in table.columns.iter().filter_map(|c| c.references) {
                assert!(
                    TABLES[..i].iter().any(|t| t.name == target),
                    "{} references {target} before it is created",
                    table.name
                );
            }
        }
    }

    #[test]
    fn renders_create_statement() {
        let ddl = MEMBERS.create_statement();
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS members ("));
        assert!(ddl.contains("id SERIAL PRIMARY KEY"));
        assert!(ddl.contains("email VARCHAR(255) NOT NULL UNIQUE"));
        assert!(ddl.contains("status VARCHAR(20) DEFAULT 'pending'"));

        let ddl = EVENT_REGISTRATIONS.create_statement();
        assert!(ddl.contains("event_id INTEGER REFERENCES events(id)"));
    }

    #[test]
    fn event_capacity_is_a_table_constraint() {
        let ddl = EVENTS.create_statement();
        assert!(ddl.contains("CONSTRAINT events_max_participants_check CHECK (max_participants >= 0)"));
        assert!(ddl.contains(
            "CONSTRAINT events_current_participants_limit_check \
             CHECK (max_participants IS NULL OR current_participants <= max_participants)"
        ));
        assert!(ddl.trim_end().ends_with(')'));
    }

    #[test]
    fn every_table_tracks_modification_time() {
        for table in TABLES {
            assert!(table.column(UPDATED_AT).is_some(), "{}", table.name);
        }
    }
}
