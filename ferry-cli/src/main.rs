//! Ferry CLI Tool
//!
//! Command line interface for validating configurations and exercising the load balancer

mod provider;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ferry_core::config::loader::load_config_from_path;
use ferry_core::LoadBalancerConfig;
use ferry_loadbalance::{LoadBalancer, LoadBalancerError, ProviderHealth};
use provider::ExampleProvider;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ferry-cli")]
#[command(about = "A CLI tool for the Ferry load balancer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration file
    ValidateConfig {
        /// Path to configuration file
        #[arg(short, long, default_value = "ferry.toml")]
        config: String,
    },
    /// Generate example configuration file
    GenerateConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "ferry_example.toml")]
        output: String,
    },
    /// Route requests across example providers and report the distribution
    Simulate {
        /// Path to configuration file, defaults are used when omitted
        #[arg(short, long)]
        config: Option<String>,
        /// Number of providers to register
        #[arg(short, long, default_value_t = 3)]
        providers: usize,
        /// Number of requests to route
        #[arg(short, long, default_value_t = 20)]
        requests: usize,
        /// Number of providers whose health probe fails
        #[arg(short, long, default_value_t = 0)]
        unhealthy: usize,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Default, Serialize)]
struct SimulationReport {
    requests: usize,
    successes: usize,
    rejected: usize,
    no_active_providers: usize,
    provider_errors: usize,
    distribution: BTreeMap<String, usize>,
    providers: Vec<ProviderHealth>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::ValidateConfig { config } => {
            println!("Validating configuration file: {}", config);
            match load_config_from_path(&config) {
                Ok(cfg) => {
                    println!("✅ Configuration is valid");
                    println!("  - capacity: {}", cfg.capacity);
                    println!("  - strategy: {:?}", cfg.strategy);
                    match cfg.simultaneous_call_single_provider_limit {
                        Some(limit) => println!("  - per-provider call limit: {}", limit),
                        None => println!("  - per-provider call limit: unlimited"),
                    }
                    println!("  - health check interval: {}ms", cfg.health_check.interval_ms);
                }
                Err(e) => {
                    eprintln!("❌ Configuration validation failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::GenerateConfig { output } => {
            println!("Generating configuration file: {}", output);
            generate_config_file(&output)?;
            println!("✅ Configuration file generated successfully");
        }
        Commands::Simulate {
            config,
            providers,
            requests,
            unhealthy,
            json,
        } => {
            let cfg = match config {
                Some(path) => load_config_from_path(&path)?,
                None => LoadBalancerConfig::default(),
            };
            let report = simulate(&cfg, providers, requests, unhealthy).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
    }

    Ok(())
}

/// 生成配置文件
fn generate_config_file(output_path: &str) -> Result<()> {
    let config_content = r#"# Ferry Load Balancer Configuration File

# Maximum number of registered providers
capacity = 10

# Balancing strategy: "random" or "round_robin"
strategy = "round_robin"

# Concurrent calls allowed per active provider; remove for unlimited
simultaneous_call_single_provider_limit = 5

[health_check]
interval_ms = 5000
stop_timeout_ms = 1000
"#;

    std::fs::write(output_path, config_content)?;
    Ok(())
}

/// 注册示例provider并路由请求
async fn simulate(
    config: &LoadBalancerConfig,
    providers: usize,
    requests: usize,
    unhealthy: usize,
) -> Result<SimulationReport> {
    let lb: LoadBalancer<String> = LoadBalancer::new(config)?;

    for i in 0..providers {
        let provider = if i < unhealthy {
            ExampleProvider::unhealthy()
        } else {
            ExampleProvider::new()
        };
        lb.register(Arc::new(provider))?;
    }

    lb.start_health_checking(config.health_check.interval())
        .await?;
    // 手动再执行一轮，确保不健康的provider在路由前已被排除
    lb.check_providers_health().await;

    let mut report = SimulationReport {
        requests,
        ..Default::default()
    };
    for _ in 0..requests {
        match lb.get().await {
            Ok(instance_id) => {
                report.successes += 1;
                *report.distribution.entry(instance_id).or_insert(0) += 1;
            }
            Err(LoadBalancerError::ClusterCapacityExceeded { .. }) => report.rejected += 1,
            Err(LoadBalancerError::NoActiveProviders) => report.no_active_providers += 1,
            Err(e) => {
                tracing::warn!("Request failed: {}", e);
                report.provider_errors += 1;
            }
        }
    }

    lb.stop_health_checking(config.health_check.stop_timeout())
        .await?;
    report.providers = lb.health_report();
    Ok(report)
}

/// 显示模拟结果
fn print_report(report: &SimulationReport) {
    println!("📊 Simulation Results");
    println!("=====================");
    println!("Requests: {}", report.requests);
    println!("Successful: {}", report.successes);
    println!("Rejected (cluster capacity): {}", report.rejected);
    println!("No active providers: {}", report.no_active_providers);
    println!("Provider errors: {}", report.provider_errors);
    println!();

    println!("🏥 Providers");
    println!("============");
    for health in &report.providers {
        let served = report.distribution.get(&health.name).copied().unwrap_or(0);
        let status = if health.status.is_active() {
            "🟢"
        } else {
            "🔴"
        };
        println!(
            "{} {} {} [{}] served {} requests",
            status, health.id, health.name, health.status, served
        );
    }
}
