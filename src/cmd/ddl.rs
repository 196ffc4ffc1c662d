//! DDL command - print the schema as CREATE statements.

use anyhow::{Context, Result};
use rental_seed::schema::{rental_schema, render_ddl, SqlDialect};

pub fn run(dialect: String) -> Result<()> {
    let dialect: SqlDialect = dialect
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))
        .context("invalid --dialect")?;

    let ddl = render_ddl(&rental_schema(), dialect)?;
    print!("{}", ddl);
    Ok(())
}
