use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use cloudcrafters_core::Config;
use cloudcrafters_core::ModelExecutor;
use cloudcrafters_core::ToolRegistry;
use cloudcrafters_core::builtin_pipeline;
use cloudcrafters_crew::PipelineDefinition;
use cloudcrafters_crew::StageEvent;
use cloudcrafters_crew::StageResult;
use cloudcrafters_crew::TaskChain;
use cloudcrafters_crew::TemplateVars;
use cloudcrafters_crew::parse_pipeline_file;
use owo_colors::OwoColorize;
use serde_json::json;

use crate::OutputFormat;
use crate::RunArgs;
use crate::report::RunReport;

fn load_pipeline(path: Option<&Path>) -> Result<PipelineDefinition> {
    match path {
        Some(path) => parse_pipeline_file(path)
            .with_context(|| format!("failed to load pipeline {}", path.display())),
        None => builtin_pipeline().context("built-in pipeline is invalid"),
    }
}

fn use_colors(config: &Config) -> bool {
    config.output.colors && std::io::stdout().is_terminal()
}

fn print_stage(result: &StageResult, colors: bool) {
    if colors {
        println!("{}: {}\n", result.label.bold().green(), result.text);
    } else {
        println!("{}: {}\n", result.label, result.text);
    }
}

pub async fn run(mut config: Config, args: RunArgs) -> Result<()> {
    let RunArgs {
        subject,
        pipeline,
        model,
        vars,
        format,
    } = args;

    if let Some(model) = model {
        config.model.model = model;
    }
    if let Some(subject) = subject {
        config.run.subject = Some(subject);
    }

    let definition = load_pipeline(pipeline.as_deref())?;
    config.api_key().context("cannot run the pipeline")?;
    let issues = config.validate();
    if !issues.is_empty() {
        anyhow::bail!("invalid configuration:\n  - {}", issues.join("\n  - "));
    }

    let tools = ToolRegistry::from_config(&config.search).context("failed to set up tools")?;
    let executor = ModelExecutor::from_config(&config, Arc::new(tools))?;
    executor.check_agents(&definition)?;

    let mut overrides = TemplateVars::new();
    if let Some(subject) = config.run.subject.as_deref() {
        overrides.insert(config.run.subject_variable.as_str(), subject)?;
    }
    for (name, value) in vars {
        overrides.insert(name, value)?;
    }

    let chain = TaskChain::new(definition);
    let initial = chain.initial_vars(&overrides);
    chain.check_bindings(&initial)?;
    tracing::debug!(
        pipeline = chain.definition().name(),
        model = executor.model(),
        inputs = ?initial.keys().collect::<Vec<_>>(),
        "starting run"
    );

    let mut report = RunReport::new(chain.definition().name(), executor.model(), initial.clone());
    let colors = use_colors(&config);
    let results = chain
        .run(&executor, initial, |event| {
            if let StageEvent::Completed { result, .. } = event {
                if format == OutputFormat::Text {
                    print_stage(&result, colors);
                }
            }
        })
        .await?;

    if format == OutputFormat::Json {
        report.stages = results;
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

pub fn list(config: &Config, pipeline: Option<&Path>, format: OutputFormat) -> Result<()> {
    let definition = load_pipeline(pipeline)?;

    if format == OutputFormat::Json {
        let value = json!({
            "name": definition.name(),
            "inputs": definition.inputs(),
            "required_inputs": definition.required_inputs(),
            "agents": definition.agents().collect::<Vec<_>>(),
            "stages": definition.stages(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let colors = use_colors(config);
    let heading = |text: &str| {
        if colors {
            text.bold().blue().to_string()
        } else {
            text.to_string()
        }
    };

    println!("{} {}\n", heading("Pipeline:"), definition.name());

    println!("{}", heading("Agents:"));
    for agent in definition.agents() {
        println!("  {} ({})", agent.name(), agent.role());
        if !agent.tools().is_empty() {
            println!("      Tools: {}", agent.tools().join(", "));
        }
        if let Some(model) = agent.model() {
            println!("      Model: {model}");
        }
    }
    println!();

    println!("{}", heading("Stages:"));
    for (i, stage) in definition.stages().iter().enumerate() {
        println!(
            "  {}. {} [{}] -> {{{}}} \"{}\"",
            i + 1,
            stage.name(),
            stage.agent(),
            stage.output(),
            stage.label()
        );
    }

    if !definition.inputs().is_empty() {
        println!();
        println!("{}", heading("Inputs:"));
        for (name, value) in definition.inputs().iter() {
            println!("  {name} = {value}");
        }
    }
    let missing: Vec<String> = definition
        .required_inputs()
        .into_iter()
        .filter(|name| !definition.inputs().contains(name))
        .collect();
    if !missing.is_empty() {
        println!();
        println!("{} {}", heading("Required with --var:"), missing.join(", "));
    }
    Ok(())
}

pub fn status(config: &Config) -> Result<()> {
    let colors = use_colors(config);
    let source = config
        .source
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "defaults".to_string());
    let key = if config.api_key().is_ok() {
        "configured"
    } else {
        "not configured"
    };

    println!("Configuration: {source}");
    println!("Model: {}", config.model.model);
    println!("Endpoint: {}", config.model.base_url);
    println!("API key: {key}");
    println!("Timeout: {}s", config.model.timeout_secs);
    println!(
        "Subject: {}",
        config.run.subject.as_deref().unwrap_or("(pipeline default)")
    );
    println!("Tool round trips per stage: {}", config.run.max_tool_iterations);
    if config.search.enabled {
        println!(
            "Web search: {} (max {} results)",
            config.search.base_url, config.search.max_results
        );
    } else {
        println!("Web search: disabled");
    }
    println!();

    let issues = config.validate();
    if issues.is_empty() {
        if colors {
            println!("{}", "All checks passed".green());
        } else {
            println!("All checks passed");
        }
    } else {
        println!("Issues found:");
        for issue in issues {
            if colors {
                println!("  - {}", issue.yellow());
            } else {
                println!("  - {issue}");
            }
        }
    }
    Ok(())
}
