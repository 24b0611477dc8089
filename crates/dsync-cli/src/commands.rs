use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use dsync_directory::LdapConnector;
use dsync_policy::{CompileErrors, CompileReport, ModuleFile, PolicyCompiler};
use dsync_store::{InMemoryStore, StorePath, Transaction, TransactionalStore, TxnMode};
use dsync_sync::{SyncConfig, SyncReport, Synchronizer};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Run(args) => cmd_run(args, cli.format),
        Command::Check(args) => cmd_check(args, cli.format),
        Command::Config(args) => cmd_config(args, cli.format),
    }
}

fn cmd_run(args: RunArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = load_config(&args.config)?;
    let connector = LdapConnector::new().with_tls_verification(args.verify_tls);
    let store = Arc::new(InMemoryStore::new());
    let sync = Synchronizer::new(config, connector, Arc::clone(&store))?;

    let runtime = tokio::runtime::Runtime::new()?;
    let report = runtime.block_on(async {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                trigger.cancel();
            }
        });
        let outcome = sync.start(&cancel).await;
        sync.stop().await;
        outcome
    })?;

    match format {
        OutputFormat::Json => {
            let mut out = json!({ "report": report });
            if args.dump {
                out["store"] = dump_store(&store)?;
            }
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            print_report(&report);
            if args.dump {
                println!("{}", serde_json::to_string_pretty(&dump_store(&store)?)?);
            }
        }
    }
    Ok(())
}

fn print_report(report: &SyncReport) {
    println!("{} Directory sync complete", "✓".green().bold());
    println!("  Documents: {}", report.documents.to_string().bold());
    println!(
        "  Policies: {} ({} rules)",
        report.policies.to_string().bold(),
        report.rules
    );
    println!("  Attempts: {}", report.attempts.to_string().yellow());
    println!("  Elapsed: {}", format!("{:?}", report.elapsed).dimmed());
}

/// Whole document tree plus every installed policy source.
fn dump_store(store: &InMemoryStore) -> anyhow::Result<Value> {
    let txn = store.begin(TxnMode::Read)?;
    let contents = (|| -> anyhow::Result<Value> {
        let data = txn.read(&StorePath::root())?.unwrap_or_else(|| json!({}));
        let mut policies = serde_json::Map::new();
        for id in txn.list_policies()? {
            let raw = txn.get_policy(&id)?.unwrap_or_default();
            policies.insert(id, Value::String(String::from_utf8_lossy(&raw).into_owned()));
        }
        Ok(json!({ "data": data, "policies": policies }))
    })();
    store.abort(txn);
    contents
}

fn cmd_check(args: CheckArgs, format: OutputFormat) -> anyhow::Result<()> {
    let outcome = compile_files(&args.files)?;
    match (format, &outcome) {
        (OutputFormat::Json, Ok(report)) => println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "modules": report.modules,
                "rules": report.rules,
                "errors": [],
            }))?
        ),
        (OutputFormat::Json, Err(errors)) => println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "errors": errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "truncated": errors.truncated,
            }))?
        ),
        (OutputFormat::Text, Ok(report)) => {
            for stage in &report.stage_results {
                println!(
                    "  {} {} {}",
                    "✓".green(),
                    stage.stage_name,
                    format!("({:?})", stage.elapsed).dimmed()
                );
            }
            println!(
                "{} {} modules, {} rules",
                "✓".green().bold(),
                report.modules,
                report.rules
            );
        }
        (OutputFormat::Text, Err(errors)) => {
            for err in errors.iter() {
                println!("  {} {}", "✗".red(), err);
            }
            if errors.truncated {
                println!("  {}", "(error limit reached)".dimmed());
            }
        }
    }
    match outcome {
        Ok(_) => Ok(()),
        Err(errors) => anyhow::bail!("{} compile errors", errors.len()),
    }
}

/// Parse every file and compile them as one set. Read and syntax errors
/// are returned as `Err`; compile failures as the inner `Err`.
fn compile_files(files: &[PathBuf]) -> anyhow::Result<Result<CompileReport, CompileErrors>> {
    let mut modules = BTreeMap::new();
    for file in files {
        let raw = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
        let module = ModuleFile::parse(file.display().to_string(), raw)?;
        debug!(path = %module.path, rules = module.parsed.rules.len(), "parsed module");
        modules.insert(module.path, module.parsed);
    }
    Ok(PolicyCompiler::default().compile(&modules))
}

fn cmd_config(args: ConfigArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = redacted(load_config(&args.config)?);
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        OutputFormat::Text => {
            println!("{} {} is valid", "✓".green().bold(), args.config.display());
            println!("  Address: {}", config.connection.address.bold());
            println!("  Base DN: {}", config.connection.base_dn.cyan());
            println!("  Username: {}", config.connection.username);
            println!("  Password: {}", config.connection.password.dimmed());
            let max = config
                .retry
                .max_attempts
                .map_or_else(|| "unlimited".to_string(), |n| n.to_string());
            println!(
                "  Retry: every {:?}, {} attempts",
                config.retry.interval(),
                max.yellow()
            );
            println!(
                "  Documents: objectClass={} ({}, {})",
                config.schema.document_class.yellow(),
                config.schema.document_path_attr,
                config.schema.document_content_attr
            );
            println!(
                "  Policies: objectClass={} ({}, {})",
                config.schema.policy_class.yellow(),
                config.schema.policy_id_attr,
                config.schema.policy_content_attr
            );
        }
    }
    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<SyncConfig> {
    let raw = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    SyncConfig::from_slice(&raw).with_context(|| format!("loading {}", path.display()))
}

fn redacted(mut config: SyncConfig) -> SyncConfig {
    config.connection.password = "[REDACTED]".into();
    config
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use dsync_policy::CompileErrorKind;
    use tempfile::NamedTempFile;

    use super::*;

    fn temp_file(suffix: &str, contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_toml_config() {
        let file = temp_file(
            ".toml",
            "addr = \"ldap.example.com:389\"\nbase_dn = \"dc=example,dc=com\"\n\
             username = \"cn=admin\"\npassword = \"secret\"\n\n[retry]\ninterval_secs = 1.5\n",
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.connection.address, "ldap.example.com:389");
        assert_eq!(config.retry.interval_secs, 1.5);

        let shown = redacted(config);
        assert_eq!(shown.connection.password, "[REDACTED]");
        let out = serde_json::to_string(&shown).unwrap();
        assert!(!out.contains("secret"));
    }

    #[test]
    fn config_errors_name_the_file() {
        let file = temp_file(".json", r#"{"addr": "x", "base_dn": "", "username": "u", "password": "p"}"#);
        let err = load_config(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("base_dn"));
        assert!(err.to_string().contains(&file.path().display().to_string()));

        let missing = load_config(Path::new("/nonexistent/dsync.toml")).unwrap_err();
        assert!(missing.to_string().contains("reading"));
    }

    #[test]
    fn check_compiles_module_set() {
        let a = temp_file(".rego", "package authz\n\ndefault allow := false\n");
        let b = temp_file(".rego", "package authz\n\nimport rego.v1\n\nallow if input.admin\n");
        let report = compile_files(&[a.path().into(), b.path().into()])
            .unwrap()
            .unwrap();
        assert_eq!(report.modules, 2);
        assert_eq!(report.rules, 2);
    }

    #[test]
    fn check_reports_conflicts() {
        let a = temp_file(".rego", "package p\n\nx := 1\n");
        let b = temp_file(".rego", "package p\n\nimport rego.v1\n\nx contains k if { k := 1 }\n");
        let errors = compile_files(&[a.path().into(), b.path().into()])
            .unwrap()
            .unwrap_err();
        assert!(errors.has_kind(CompileErrorKind::RuleConflict));
    }

    #[test]
    fn check_surfaces_syntax_errors() {
        let a = temp_file(".rego", "package p\n\nx := [1, 2\n");
        let err = compile_files(&[a.path().into()]).unwrap_err();
        assert!(err.to_string().contains("parse error"));
    }

    #[test]
    fn check_reports_unsafe_variables() {
        let a = temp_file(".rego", "package p\n\nimport rego.v1\n\ndeny if { x > 1 }\n");
        let errors = compile_files(&[a.path().into()]).unwrap().unwrap_err();
        assert!(errors.has_kind(CompileErrorKind::UnsafeVar));
    }

    #[test]
    fn dump_of_empty_store() {
        let store = InMemoryStore::new();
        let dump = dump_store(&store).unwrap();
        assert_eq!(dump, json!({ "data": {}, "policies": {} }));
    }
}
