// CLI Command Implementations
// Validate and simulate run without a daemon; start is handled in main

use super::{error, info, success, Commands};
use crate::config::QuinceConfig;
use crate::destination::{DestinationSpec, DestinationType};
use crate::identity::InMemoryIdentityProvider;
use crate::namespace::{Engine, EngineSettings};
use crate::plans::{DestinationPlan, NamespacePlan, PlanRegistry};
use crate::resources::ResourceDefinition;
use crate::scaling::{InMemoryLifecycleManager, ReplicaLifecycleManager};
use colored::*;
use serde::Deserialize;
use std::sync::Arc;

/// Execute a CLI command
pub async fn execute(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Start { .. } => {
            // Dispatched in main before reaching here
            Ok(())
        }
        Commands::Validate { file } => validate_command(file).await,
        Commands::Simulate { file, json } => simulate_command(file, json).await,
    }
}

/// Validate a configuration file
async fn validate_command(file: String) -> anyhow::Result<()> {
    info(&format!("Validating {}", file.bright_white()));

    match QuinceConfig::load(&file) {
        Ok(_) => {
            success("Configuration file is valid");
            Ok(())
        }
        Err(e) => {
            error(&format!("Configuration invalid: {e:#}"));
            Err(e)
        }
    }
}

/// Resource definitions and plans declared in a TOML file, registered at
/// daemon startup (`plans.file` in quince.toml) or as part of a scenario
#[derive(Debug, Default, Deserialize)]
pub struct PlanCatalog {
    #[serde(default)]
    resources: Vec<ScenarioResource>,
    #[serde(default)]
    destination_plans: Vec<ScenarioDestinationPlan>,
    #[serde(default)]
    namespace_plans: Vec<ScenarioNamespacePlan>,
}

impl PlanCatalog {
    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Register everything in dependency order: resources, then
    /// destination plans, then namespace plans
    pub fn register(&self, registry: &PlanRegistry) -> anyhow::Result<()> {
        for resource in &self.resources {
            registry.register_resource_definition(ResourceDefinition::new(&resource.kind))?;
        }
        for plan in &self.destination_plans {
            let mut built = DestinationPlan::new(&plan.name, plan.destination_type);
            for request in &plan.requests {
                built = built.with_request(&request.kind, request.fraction);
            }
            registry.register_destination_plan(built)?;
        }
        for plan in &self.namespace_plans {
            let mut built = NamespacePlan::new(&plan.name, &plan.namespace_type);
            for ceiling in &plan.ceilings {
                built = built.with_ceiling(&ceiling.kind, ceiling.min_replicas, ceiling.max_units);
            }
            for allowed in &plan.allowed_destination_plans {
                built = built.with_allowed_plan(allowed);
            }
            registry.register_namespace_plan(built)?;
        }
        Ok(())
    }
}

/// Load a plan catalog file into the registry
pub fn load_plan_catalog(registry: &PlanRegistry, path: &str) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(path)?;
    PlanCatalog::from_toml(&contents)?.register(registry)
}

/// Scenario file layout for offline simulation: a plan catalog plus the
/// namespaces and desired destinations to run through the engine
#[derive(Debug, Deserialize)]
struct Scenario {
    #[serde(default)]
    namespaces: Vec<ScenarioNamespace>,
}

#[derive(Debug, Deserialize)]
struct ScenarioResource {
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ScenarioDestinationPlan {
    name: String,
    #[serde(rename = "type")]
    destination_type: DestinationType,
    #[serde(default)]
    requests: Vec<ScenarioRequest>,
}

#[derive(Debug, Deserialize)]
struct ScenarioRequest {
    kind: String,
    fraction: f64,
}

#[derive(Debug, Deserialize)]
struct ScenarioNamespacePlan {
    name: String,
    #[serde(rename = "type", default = "default_namespace_type")]
    namespace_type: String,
    #[serde(default)]
    ceilings: Vec<ScenarioCeiling>,
    #[serde(default)]
    allowed_destination_plans: Vec<String>,
}

fn default_namespace_type() -> String {
    "standard".to_string()
}

#[derive(Debug, Deserialize)]
struct ScenarioCeiling {
    kind: String,
    #[serde(default)]
    min_replicas: usize,
    max_units: f64,
}

#[derive(Debug, Deserialize)]
struct ScenarioNamespace {
    name: String,
    plan: String,
    #[serde(default)]
    destinations: Vec<ScenarioDestination>,
}

#[derive(Debug, Deserialize)]
struct ScenarioDestination {
    name: String,
    #[serde(rename = "type")]
    destination_type: DestinationType,
    #[serde(default)]
    plan: Option<String>,
}

/// Load a scenario, run it through an in-process engine and print each
/// destination's admission result and placement
async fn simulate_command(file: String, json: bool) -> anyhow::Result<()> {
    if !json {
        info(&format!("Loading scenario from {}", file.bright_white()));
    }
    let contents = std::fs::read_to_string(&file)?;
    let scenario: Scenario = toml::from_str(&contents)?;

    let registry = Arc::new(PlanRegistry::new());
    PlanCatalog::from_toml(&contents)?.register(&registry)?;

    let lifecycle = Arc::new(InMemoryLifecycleManager::new());
    let engine = Arc::new(Engine::new(
        registry,
        lifecycle.clone(),
        Arc::new(InMemoryIdentityProvider::new()),
        EngineSettings::default(),
    ));

    for namespace in &scenario.namespaces {
        engine.create_namespace(&namespace.name, &namespace.plan).await?;
        let specs: Vec<DestinationSpec> = namespace
            .destinations
            .iter()
            .map(|d| DestinationSpec {
                name: d.name.clone(),
                destination_type: d.destination_type,
                plan: d.plan.clone(),
            })
            .collect();
        engine.set_destinations(&namespace.name, specs).await?;
    }

    // Two passes: the first admits and places, the second converges
    // replica counts and proves quiescence
    let mut json_out = Vec::new();
    for namespace in &scenario.namespaces {
        engine.reconcile(&namespace.name).await?;
        let report = engine.reconcile(&namespace.name).await?;

        if json {
            let destinations: Vec<serde_json::Value> = engine
                .destination_statuses(&namespace.name)
                .await?
                .into_iter()
                .map(|s| {
                    serde_json::json!({
                        "name": s.name,
                        "phase": format!("{:?}", s.phase),
                        "replica_group": s.replica_group_id,
                        "status_messages": s.status_messages,
                    })
                })
                .collect();
            let mut kinds = serde_json::Map::new();
            for (kind, total) in &report.utilization.per_kind {
                let replicas = lifecycle
                    .observed_replica_count(&namespace.name, kind)
                    .await?;
                kinds.insert(
                    kind.clone(),
                    serde_json::json!({ "used": total, "replicas": replicas }),
                );
            }
            json_out.push(serde_json::json!({
                "namespace": namespace.name,
                "destinations": destinations,
                "resources": kinds,
            }));
            continue;
        }

        println!();
        println!("{}", format!("namespace {}", namespace.name).bright_white().bold());
        for status in engine.destination_statuses(&namespace.name).await? {
            let phase = format!("{:?}", status.phase);
            let phase = match phase.as_str() {
                "Active" => phase.green(),
                "Pending" => phase.yellow(),
                _ => phase.red(),
            };
            let group = status
                .replica_group_id
                .map(|g| g.to_string())
                .unwrap_or_else(|| "-".to_string());
            let messages = status.status_messages.join("; ");
            println!(
                "  {:<24} {:<12} {:<16} {}",
                status.name.cyan(),
                phase,
                group,
                messages.bright_black()
            );
        }
        for (kind, total) in &report.utilization.per_kind {
            let replicas = lifecycle
                .observed_replica_count(&namespace.name, kind)
                .await?;
            println!(
                "  {:<24} {} used, {} replica(s)",
                format!("[{kind}]").bright_white(),
                format!("{total:.2}").yellow(),
                replicas.to_string().yellow()
            );
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&json_out)?);
    } else {
        println!();
        success("Simulation complete");
    }
    Ok(())
}
