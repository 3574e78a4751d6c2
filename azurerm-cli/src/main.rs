mod manifest;

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;

use azurerm_core::differ::{create_plan, destroy_plan};
use azurerm_core::effect::Effect;
use azurerm_core::interpreter::{ApplyResult, EffectOutcome, Interpreter, InterpreterConfig};
use azurerm_core::plan::Plan;
use azurerm_core::provider::Provider;
use azurerm_core::resource::{Resource, ResourceId, State, Value};
use azurerm_core::schema::ResourceSchema;
use azurerm_provider::ids::ArmResourceId;
use azurerm_provider::resources::resource_types;
use azurerm_provider::schemas::configs;
use azurerm_provider::{AzurermProvider, ProviderConfig};

use manifest::Manifest;

#[derive(Parser)]
#[command(name = "azurerm")]
#[command(about = "Manage Azure Resource Manager resources from a JSON manifest", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the manifest against the resource schemas
    Validate {
        /// Path to the manifest
        #[arg(env = "AZURERM_MANIFEST", default_value = "main.json")]
        file: PathBuf,
    },
    /// Show execution plan without applying changes
    Plan {
        /// Path to the manifest
        #[arg(env = "AZURERM_MANIFEST", default_value = "main.json")]
        file: PathBuf,
    },
    /// Apply changes to reach the desired state
    Apply {
        /// Path to the manifest
        #[arg(env = "AZURERM_MANIFEST", default_value = "main.json")]
        file: PathBuf,

        /// Keep going after a change fails
        #[arg(long)]
        continue_on_error: bool,
    },
    /// Destroy all resources defined in the manifest
    Destroy {
        /// Path to the manifest
        #[arg(env = "AZURERM_MANIFEST", default_value = "main.json")]
        file: PathBuf,

        /// Skip confirmation prompt (auto-approve)
        #[arg(long)]
        auto_approve: bool,
    },
    /// Show the supported resource types, or the attributes of one
    Schema {
        /// Resource type (e.g., key_vault)
        resource_type: Option<String>,
    },
    /// Split an Azure resource ID into its parts
    ParseId {
        /// Resource ID, e.g. /subscriptions/.../resourceGroups/rg1
        id: String,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { file } => run_validate(&file),
        Commands::Plan { file } => run_plan(&file).await,
        Commands::Apply {
            file,
            continue_on_error,
        } => run_apply(&file, continue_on_error).await,
        Commands::Destroy { file, auto_approve } => run_destroy(&file, auto_approve).await,
        Commands::Schema { resource_type } => run_schema(resource_type.as_deref()),
        Commands::ParseId { id } => run_parse_id(&id),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "azurerm", &mut io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Schemas keyed by manifest resource type
fn get_schemas() -> HashMap<String, ResourceSchema> {
    resource_types()
        .into_iter()
        .map(|t| (t.name().to_string(), t.schema()))
        .collect()
}

fn validate_resources(resources: &[Resource]) -> Result<(), String> {
    let schemas = get_schemas();
    let mut all_errors = Vec::new();

    for resource in resources {
        let Some(schema) = schemas.get(&resource.id.resource_type) else {
            all_errors.push(format!(
                "{}: unknown resource type '{}'",
                resource.id, resource.id.resource_type
            ));
            continue;
        };

        let mut attributes = resource.attributes.clone();
        schema.apply_defaults(&mut attributes);
        if let Err(errors) = schema.validate(&attributes) {
            for error in errors {
                all_errors.push(format!("{}: {}", resource.id, error));
            }
        }
    }

    if all_errors.is_empty() {
        Ok(())
    } else {
        Err(format!("Validation failed:\n  {}", all_errors.join("\n  ")))
    }
}

fn run_validate(file: &Path) -> Result<(), String> {
    let manifest = Manifest::load(file)?;
    let resources = manifest.resources();

    println!("{}", "Validating...".cyan());

    validate_resources(&resources)?;

    println!(
        "{}",
        format!("✓ {} resources validated successfully.", resources.len())
            .green()
            .bold()
    );

    for resource in &resources {
        let marker = if resource.read_only { " (read-only)" } else { "" };
        println!("  • {}{}", resource.id, marker.dimmed());
    }

    Ok(())
}

fn get_provider(manifest: &Manifest) -> Result<AzurermProvider, String> {
    let config = ProviderConfig::load(manifest.provider.clone())
        .map_err(|e| format!("Provider configuration error: {}", e))?;
    log::debug!(
        "using subscription {} at {}",
        config.subscription_id,
        config.resource_manager_endpoint
    );
    AzurermProvider::new(config).map_err(|e| e.to_string())
}

/// Declared resources with provider normalization and schema defaults applied
fn prepare_resources<P: Provider>(provider: &P, resources: &[Resource]) -> Vec<Resource> {
    let schemas = get_schemas();
    resources
        .iter()
        .cloned()
        .map(|mut resource| {
            provider.normalize(&mut resource);
            if let Some(schema) = schemas.get(&resource.id.resource_type) {
                schema.apply_defaults(&mut resource.attributes);
            }
            resource
        })
        .collect()
}

async fn read_states<P: Provider>(
    provider: &P,
    resources: &[Resource],
) -> Result<HashMap<ResourceId, State>, String> {
    let mut current_states = HashMap::new();
    for resource in resources.iter().filter(|r| !r.read_only) {
        let identifier = provider
            .identifier_for(resource)
            .map_err(|e| e.to_string())?;
        log::debug!("reading {} ({:?})", resource.id, identifier);
        let state = provider
            .read(&resource.id, identifier.as_deref(), resource.timeouts())
            .await
            .map_err(|e| format!("Failed to read state: {}", e))?;
        current_states.insert(resource.id.clone(), state);
    }
    Ok(current_states)
}

async fn build_plan<P: Provider>(provider: &P, resources: &[Resource]) -> Result<Plan, String> {
    validate_resources(resources)?;
    let desired = prepare_resources(provider, resources);
    let current_states = read_states(provider, &desired).await?;
    Ok(create_plan(&desired, &current_states, &get_schemas()))
}

/// Deletions for every declared resource that currently exists
async fn build_destroy_plan<P: Provider>(
    provider: &P,
    resources: &[Resource],
) -> Result<Plan, String> {
    let current_states = read_states(provider, resources).await?;
    Ok(destroy_plan(resources, &current_states))
}

async fn run_plan(file: &Path) -> Result<(), String> {
    let manifest = Manifest::load(file)?;
    let provider = get_provider(&manifest)?;

    let plan = build_plan(&provider, &manifest.resources()).await?;
    print_plan(&plan, &get_schemas());
    Ok(())
}

async fn run_apply(file: &Path, continue_on_error: bool) -> Result<(), String> {
    let manifest = Manifest::load(file)?;
    let provider = get_provider(&manifest)?;

    let plan = build_plan(&provider, &manifest.resources()).await?;
    if plan.mutation_count() == 0 {
        println!("{}", "No changes needed.".green());
        return Ok(());
    }

    print_plan(&plan, &get_schemas());
    println!();

    println!("{}", "Applying changes...".cyan().bold());
    println!();

    let interpreter = Interpreter::new(provider).with_config(InterpreterConfig {
        dry_run: false,
        continue_on_error,
    });
    let result = interpreter.apply(&plan).await;
    print_outcomes(&plan, &result);

    println!();
    if result.is_success() {
        println!(
            "{}",
            format!("Apply complete! {} changes applied.", result.success_count)
                .green()
                .bold()
        );
        Ok(())
    } else {
        Err(format!(
            "Apply failed. {} succeeded, {} failed.",
            result.success_count, result.failure_count
        ))
    }
}

async fn run_destroy(file: &Path, auto_approve: bool) -> Result<(), String> {
    let manifest = Manifest::load(file)?;

    let resources: Vec<Resource> = manifest
        .resources()
        .into_iter()
        .filter(|r| !r.read_only)
        .collect();
    if resources.is_empty() {
        println!("{}", "No resources defined in manifest.".yellow());
        return Ok(());
    }

    let provider = get_provider(&manifest)?;
    let resources = prepare_resources(&provider, &resources);
    let plan = build_destroy_plan(&provider, &resources).await?;

    if plan.is_empty() {
        println!("{}", "No resources to destroy.".green());
        return Ok(());
    }

    println!("{}", "Destroy Plan:".red().bold());
    println!();
    for effect in plan.effects() {
        if let Effect::Delete { id, identifier, .. } = effect {
            println!("  {} {}", "-".red().bold(), id);
            println!("      {}", identifier.dimmed());
        }
    }
    println!();
    println!(
        "Plan: {} to destroy.",
        plan.summary().delete.to_string().red()
    );
    println!();

    if !auto_approve && !confirm_destroy()? {
        println!();
        println!("{}", "Destroy cancelled.".yellow());
        return Ok(());
    }

    println!("{}", "Destroying resources...".red().bold());
    println!();

    let result = Interpreter::new(provider).apply(&plan).await;
    print_outcomes(&plan, &result);

    println!();
    if result.is_success() {
        println!(
            "{}",
            format!("Destroy complete! {} resources destroyed.", result.success_count)
                .green()
                .bold()
        );
        Ok(())
    } else {
        Err(format!(
            "Destroy failed. {} succeeded, {} failed.",
            result.success_count, result.failure_count
        ))
    }
}

fn confirm_destroy() -> Result<bool, String> {
    println!(
        "{}",
        "Do you really want to destroy all resources?".yellow().bold()
    );
    println!(
        "  {}",
        "This action cannot be undone. Type 'yes' to confirm.".yellow()
    );
    print!("\n  Enter a value: ");
    io::Write::flush(&mut io::stdout()).map_err(|e| e.to_string())?;

    let mut input = String::new();
    io::stdin().read_line(&mut input).map_err(|e| e.to_string())?;
    Ok(input.trim() == "yes")
}

fn print_outcomes(plan: &Plan, result: &ApplyResult) {
    for (effect, outcome) in plan.effects().iter().zip(&result.outcomes) {
        match outcome {
            Ok(EffectOutcome::Skipped { reason }) => {
                println!("  {} {} ({})", "-".dimmed(), format_effect(effect), reason)
            }
            Ok(_) => println!("  {} {}", "✓".green(), format_effect(effect)),
            Err(e) => println!("  {} {} - {}", "✗".red(), format_effect(effect), e),
        }
    }

    let not_attempted = plan.effects().len() - result.outcomes.len();
    if not_attempted > 0 {
        println!();
        println!(
            "{}",
            format!("{} changes were not attempted.", not_attempted).yellow()
        );
    }
}

// =============================================================================
// Plan Output
// =============================================================================

fn print_plan(plan: &Plan, schemas: &HashMap<String, ResourceSchema>) {
    if plan.mutation_count() == 0 {
        println!("{}", "No changes. Infrastructure is up-to-date.".green());
        return;
    }

    println!("{}", "Execution Plan:".cyan().bold());
    println!();

    let attr_prefix = "      ";
    for effect in plan.effects() {
        let schema = schemas.get(&effect.resource_id().resource_type);
        match effect {
            Effect::Create(r) => {
                println!("  {} {}", "+".green().bold(), r.id.to_string().cyan().bold());
                for key in display_keys(r.attributes.keys()) {
                    println!(
                        "{}{}: {}",
                        attr_prefix,
                        key,
                        format_attribute(schema, key, &r.attributes[key]).green()
                    );
                }
            }
            Effect::Update {
                id,
                from,
                to,
                changed_attributes,
            } => {
                println!("  {} {}", "~".yellow().bold(), id.to_string().cyan().bold());
                print_changes(schema, from, to, changed_attributes);
            }
            Effect::Replace {
                id,
                from,
                to,
                changed_attributes,
            } => {
                println!(
                    "  {} {} {}",
                    "-/+".red().bold(),
                    id.to_string().cyan().bold(),
                    "(must be replaced)".red()
                );
                print_changes(schema, from, to, changed_attributes);
            }
            Effect::Delete { id, identifier, .. } => {
                println!("  {} {}", "-".red().bold(), id.to_string().cyan().bold());
                println!("{}{}: {}", attr_prefix, "id".bold(), identifier.red());
            }
            Effect::Read(r) => {
                println!("  {} {} {}", "?".normal(), r.id, "(read)".dimmed());
            }
        }
    }

    println!();
    let summary = plan.summary();
    println!(
        "Plan: {} to add, {} to change, {} to replace, {} to destroy.",
        summary.create.to_string().green(),
        summary.update.to_string().yellow(),
        summary.replace.to_string().red(),
        summary.delete.to_string().red()
    );
}

fn print_changes(
    schema: Option<&ResourceSchema>,
    from: &State,
    to: &Resource,
    changed_attributes: &[String],
) {
    for key in display_keys(changed_attributes.iter()) {
        let Some(new_value) = to.attributes.get(key) else {
            continue;
        };
        let old = from
            .attributes
            .get(key)
            .map(|v| format_attribute(schema, key, v))
            .unwrap_or_else(|| "(none)".to_string());
        let forces_replacement = schema
            .and_then(|s| s.attributes.get(key))
            .is_some_and(|a| a.force_new);
        println!(
            "      {}: {} → {}{}",
            key,
            old.red(),
            format_attribute(schema, key, new_value).green(),
            if forces_replacement {
                " (forces replacement)".red().to_string()
            } else {
                String::new()
            }
        );
    }
}

/// Attribute keys in display order: `name` first, then alphabetical
fn display_keys<'a>(keys: impl Iterator<Item = &'a String>) -> Vec<&'a String> {
    let mut keys: Vec<_> = keys.filter(|k| !k.starts_with('_')).collect();
    keys.sort_by(|a, b| match (a.as_str(), b.as_str()) {
        ("name", _) => std::cmp::Ordering::Less,
        (_, "name") => std::cmp::Ordering::Greater,
        _ => a.cmp(b),
    });
    keys
}

fn format_attribute(schema: Option<&ResourceSchema>, key: &str, value: &Value) -> String {
    let sensitive = schema
        .and_then(|s| s.attributes.get(key))
        .is_some_and(|a| a.sensitive);
    if sensitive {
        "(sensitive)".to_string()
    } else {
        value.to_string()
    }
}

fn format_effect(effect: &Effect) -> String {
    match effect {
        Effect::Create(r) => format!("Create {}", r.id),
        Effect::Update { id, .. } => format!("Update {}", id),
        Effect::Replace { id, .. } => format!("Replace {}", id),
        Effect::Delete { id, .. } => format!("Delete {}", id),
        Effect::Read(r) => format!("Read {}", r.id),
    }
}

// =============================================================================
// Schema and ID Inspection
// =============================================================================

fn run_schema(resource_type: Option<&str>) -> Result<(), String> {
    let mut types = resource_types();
    types.sort_by_key(|t| t.name());

    let Some(resource_type) = resource_type else {
        println!("{}", "Resource types:".cyan().bold());
        for t in &types {
            let schema = t.schema();
            println!(
                "  {:<28} {}",
                t.name(),
                schema.description.as_deref().unwrap_or_default().dimmed()
            );
        }
        return Ok(());
    };

    let Some(schema) = types
        .iter()
        .find(|t| t.name() == resource_type)
        .map(|t| t.schema())
    else {
        let names: Vec<_> = types.iter().map(|t| t.name()).collect();
        return Err(format!(
            "Unknown resource type '{}'. Available types: {}",
            resource_type,
            names.join(", ")
        ));
    };

    println!("{}", resource_type.cyan().bold());
    if let Some(description) = &schema.description {
        println!("  {}", description);
    }
    println!();

    for attr in schema.sorted_attributes() {
        let flags = attribute_flags(attr);
        let mut line = format!("  {}: {}", attr.name.bold(), attr.attr_type.type_name());
        if !flags.is_empty() {
            line.push_str(&format!(" [{}]", flags.join(", ")).yellow().to_string());
        }
        if let Some(default) = &attr.default {
            line.push_str(&format!(" = {}", default));
        }
        println!("{}", line);
        if let Some(description) = &attr.description {
            println!("      {}", description.dimmed());
        }
    }
    Ok(())
}

fn attribute_flags(attr: &azurerm_core::schema::AttributeSchema) -> Vec<&'static str> {
    let mut flags = Vec::new();
    if attr.required {
        flags.push("required");
    }
    if attr.read_only {
        flags.push("read-only");
    } else if attr.computed {
        flags.push("computed");
    }
    if attr.force_new {
        flags.push("force-new");
    }
    if attr.sensitive {
        flags.push("sensitive");
    }
    flags
}

/// Labelled parts of an ARM ID, plus the manifest type that manages it
fn describe_id(input: &str) -> Result<Vec<(String, String)>, String> {
    let id = ArmResourceId::parse(input).map_err(|e| e.to_string())?;

    let mut parts = Vec::new();
    if let Some(subscription) = &id.subscription_id {
        parts.push(("Subscription".to_string(), subscription.clone()));
    }
    if let Some(group) = &id.resource_group_name {
        parts.push(("Resource group".to_string(), group.clone()));
    }
    if let Some(provider) = &id.provider {
        parts.push(("Provider".to_string(), provider.clone()));
    }
    for (kind, name) in &id.path {
        parts.push((kind.clone(), name.clone()));
    }

    let arm_type = match (id.resource_type(), &id.resource_group_name) {
        (Some(arm_type), _) => Some(arm_type),
        (None, Some(_)) => Some("Microsoft.Resources/resourceGroups".to_string()),
        (None, None) => None,
    };
    if let Some(arm_type) = arm_type {
        if let Some(config) = configs()
            .into_iter()
            .find(|c| c.arm_type.eq_ignore_ascii_case(&arm_type))
        {
            parts.push(("Managed as".to_string(), config.resource_type_name.to_string()));
        }
        parts.push(("Resource type".to_string(), arm_type));
    }
    if let Some(name) = id.name() {
        parts.push(("Name".to_string(), name.to_string()));
    }
    Ok(parts)
}

fn run_parse_id(input: &str) -> Result<(), String> {
    let parts = describe_id(input)?;
    let width = parts.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    for (label, value) in parts {
        let label = format!("{:<width$}", format!("{}:", label), width = width + 1);
        println!("{}  {}", label.bold(), value);
    }
    Ok(())
}
