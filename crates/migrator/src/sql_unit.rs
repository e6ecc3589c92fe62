//! SQL File Migrations
//!
//! A `.sql` migration declares its identity in leading comment headers and
//! separates forward and reverse statements with section markers:
//!
//! ```sql
//! -- Version: 20240101120000
//! -- Description: Create users table
//! -- Author: Jane Doe
//!
//! -- Up migration
//! CREATE TABLE users (id BIGSERIAL PRIMARY KEY);
//!
//! -- Down migration
//! DROP TABLE users;
//! ```
//!
//! Only comments and blank lines may appear before the first marker.

use async_trait::async_trait;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::backends::DatabasePool;
use crate::error::{MigrationError, MigrationResult};
use crate::unit::{MigrationContext, MigrationUnit, UnitJournal};

/// Parsed contents of a migration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlScript {
    pub version: String,
    pub description: String,
    pub author: String,
    pub up_sql: String,
    pub down_sql: String,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    Up,
    Down,
}

impl SqlScript {
    /// Parse headers and UP/DOWN sections
    pub fn parse(content: &str) -> MigrationResult<Self> {
        let mut version = None;
        let mut description = String::new();
        let mut author = String::new();
        let mut up_sql = Vec::new();
        let mut down_sql = Vec::new();
        let mut section = Section::Header;

        for line in content.lines() {
            let trimmed = line.trim();

            if let Some(comment) = trimmed.strip_prefix("--") {
                if let Some(marker) = section_marker(comment) {
                    section = marker;
                    continue;
                }
                if section == Section::Header {
                    if let Some((key, value)) = comment.split_once(':') {
                        match key.trim().to_lowercase().as_str() {
                            "version" => version = Some(value.trim().to_string()),
                            "description" => description = value.trim().to_string(),
                            "author" => author = value.trim().to_string(),
                            _ => {}
                        }
                    }
                }
                continue;
            }

            if trimmed.is_empty() {
                continue;
            }

            match section {
                Section::Up => up_sql.push(line),
                Section::Down => down_sql.push(line),
                Section::Header => {
                    return Err(MigrationError::Configuration(format!(
                        "SQL found before the '-- Up migration' marker: {}",
                        trimmed
                    )));
                }
            }
        }

        let version = version
            .filter(|v| !v.is_empty())
            .ok_or_else(|| MigrationError::Configuration("missing '-- Version:' header".to_string()))?;

        Ok(Self {
            version,
            description,
            author,
            up_sql: up_sql.join("\n").trim().to_string(),
            down_sql: down_sql.join("\n").trim().to_string(),
        })
    }
}

/// `-- Up`, `-- Up migration`, `-- Down`, `-- Down migration`
fn section_marker(comment: &str) -> Option<Section> {
    let text = comment.trim().to_lowercase();
    let is_marker = |word: &str| text == word || text.starts_with(&format!("{} migration", word));

    if is_marker("up") {
        Some(Section::Up)
    } else if is_marker("down") {
        Some(Section::Down)
    } else {
        None
    }
}

/// Split SQL statements for execution using proper SQL parsing
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    if sql.trim().is_empty() {
        return Vec::new();
    }

    let dialect = GenericDialect {};
    match Parser::parse_sql(&dialect, sql) {
        Ok(parsed) => parsed.into_iter().map(|stmt| format!("{};", stmt)).collect(),
        Err(e) => {
            // Dialect-specific syntax the generic parser rejects
            tracing::warn!("SQL parsing failed, using naive semicolon splitting: {}", e);
            sql.split(';')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| format!("{};", s))
                .collect()
        }
    }
}

/// Migration unit backed by a `.sql` file
pub struct SqlMigration {
    script: SqlScript,
    pool: Arc<dyn DatabasePool>,
}

impl SqlMigration {
    pub fn new(script: SqlScript, pool: Arc<dyn DatabasePool>) -> Self {
        Self { script, pool }
    }

    /// Read and parse a migration file
    pub fn from_file(path: &Path, context: &MigrationContext) -> MigrationResult<Self> {
        let content = fs::read_to_string(path)?;
        let script = SqlScript::parse(&content)?;
        Ok(Self::new(script, context.pool()))
    }

    pub fn script(&self) -> &SqlScript {
        &self.script
    }

    async fn run(&self, sql: &str, journal: &mut UnitJournal) -> MigrationResult<()> {
        let statements = split_sql_statements(sql);
        if statements.is_empty() {
            journal.feedback("No statements to execute");
            return Ok(());
        }

        let affected = self
            .pool
            .execute_in_transaction(&statements)
            .await
            .map_err(|e| MigrationError::unit(&self.script.version, e.to_string()))?;

        journal.feedback(format!(
            "Executed {} statement(s), {} row(s) affected",
            statements.len(),
            affected
        ));
        Ok(())
    }
}

#[async_trait]
impl MigrationUnit for SqlMigration {
    fn version(&self) -> &str {
        &self.script.version
    }

    fn description(&self) -> &str {
        &self.script.description
    }

    fn author(&self) -> &str {
        &self.script.author
    }

    async fn up(&mut self, journal: &mut UnitJournal) -> MigrationResult<()> {
        let sql = self.script.up_sql.clone();
        self.run(&sql, journal).await
    }

    async fn down(&mut self, journal: &mut UnitJournal) -> MigrationResult<()> {
        if self.script.down_sql.is_empty() {
            return Err(MigrationError::Irreversible {
                version: self.script.version.clone(),
            });
        }
        let sql = self.script.down_sql.clone();
        self.run(&sql, journal).await
    }
}
