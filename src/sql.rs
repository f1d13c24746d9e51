//! # SQL Reflection
//!
//! Renders `CREATE EXTERNAL FUNCTION` statements and the JSON function
//! description served by the HTTP front end.
//!
//! ```text
//! CREATE [OR REPLACE ]EXTERNAL FUNCTION [`db`.]`name`(`x` INT NULL, ...)
//!     RETURNS BIGINT NULL | TABLE(`col` TYPE NULL)
//!     AS REMOTE|COLLOCATED SERVICE "url" FORMAT ROWDAT_1|JSON|ARROW [LINK name];
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as Json};

use crate::codec::WireFormat;
use crate::dtypes::ColumnSpec;
use crate::error::{ExtFuncError, ExtFuncResult};
use crate::registry::{Endpoint, FunctionType, Registry};

/// How the database reaches the function server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppMode {
    #[default]
    Remote,
    Collocated,
}

impl AppMode {
    pub fn sql_name(self) -> &'static str {
        match self {
            AppMode::Remote => "REMOTE",
            AppMode::Collocated => "COLLOCATED",
        }
    }
}

/// Everything a `CREATE FUNCTION` statement needs besides the endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlOptions {
    pub url: String,
    pub app_mode: AppMode,
    pub format: WireFormat,
    pub database: Option<String>,
    pub replace: bool,
    /// Name of a database LINK holding connection credentials
    pub link: Option<String>,
}

impl SqlOptions {
    pub fn new(url: impl Into<String>, app_mode: AppMode) -> Self {
        SqlOptions {
            url: url.into(),
            app_mode,
            format: WireFormat::Rowdat1,
            database: None,
            replace: false,
            link: None,
        }
    }
}

/// Quote an identifier with backticks, doubling embedded backticks.
pub fn escape_name(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn column_sql(spec: &ColumnSpec) -> ExtFuncResult<String> {
    Ok(format!("{} NULL", spec.column_type()?.sql_name()))
}

fn valid_link(link: &str) -> bool {
    !link.is_empty() && link.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `CREATE EXTERNAL FUNCTION` statement for one endpoint.
pub fn create_function_sql(endpoint: &Endpoint, options: &SqlOptions) -> ExtFuncResult<String> {
    let args = endpoint
        .args
        .iter()
        .map(|arg| Ok(format!("{} {}", escape_name(&arg.name), column_sql(arg)?)))
        .collect::<ExtFuncResult<Vec<_>>>()?
        .join(", ");

    let returns = match endpoint.function_type {
        FunctionType::Udf => column_sql(&endpoint.returns)?,
        FunctionType::Tvf => {
            let name = if endpoint.returns.name.is_empty() {
                "col0"
            } else {
                endpoint.returns.name.as_str()
            };
            format!("TABLE({} {})", escape_name(name), column_sql(&endpoint.returns)?)
        }
    };

    let database = options
        .database
        .as_deref()
        .map(|db| format!("{}.", escape_name(db)))
        .unwrap_or_default();
    let or_replace = if options.replace { "OR REPLACE " } else { "" };
    let link = match options.link.as_deref() {
        Some(link) if valid_link(link) => format!(" LINK {link}"),
        Some(link) => return Err(ExtFuncError::Other(format!("invalid LINK name: {link}"))),
        None => String::new(),
    };

    Ok(format!(
        "CREATE {or_replace}EXTERNAL FUNCTION {database}{name}({args}) RETURNS {returns} \
         AS {mode} SERVICE \"{url}\" FORMAT {format}{link};",
        name = escape_name(&endpoint.name),
        mode = options.app_mode.sql_name(),
        url = options.url,
        format = options.format.sql_name(),
    ))
}

/// Statements for every endpoint, or only `name` when given.
pub fn create_functions_sql(
    registry: &Registry,
    options: &SqlOptions,
    name: Option<&str>,
) -> ExtFuncResult<Vec<String>> {
    registry
        .iter()
        .filter(|ep| name.is_none_or(|n| n == ep.name))
        .map(|ep| create_function_sql(ep, options))
        .collect()
}

fn column_info(spec: &ColumnSpec) -> ExtFuncResult<Json> {
    let ty = spec.column_type()?;
    Ok(json!({
        "name": spec.name,
        "type_code": spec.type_code,
        "sql_type": ty.sql_name(),
        "nullable": true,
    }))
}

/// `{"functions": {name: {...}}}` description of the registry.
pub fn function_info(registry: &Registry, options: &SqlOptions) -> ExtFuncResult<Json> {
    let mut functions = Map::new();
    for endpoint in registry.iter() {
        let args = endpoint
            .args
            .iter()
            .map(column_info)
            .collect::<ExtFuncResult<Vec<_>>>()?;
        let info = json!({
            "args": args,
            "returns": [column_info(&endpoint.returns)?],
            "function_type": endpoint.function_type,
            "data_format": endpoint.data_format(),
            "include_null_masks": endpoint.include_null_masks(),
            "sql_statement": create_function_sql(endpoint, &SqlOptions {
                replace: true,
                ..options.clone()
            })?,
        });
        functions.insert(endpoint.name.clone(), info);
    }
    Ok(json!({ "functions": functions }))
}
