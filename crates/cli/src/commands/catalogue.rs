//! `librarian tools` and `librarian models` — List what the agent can use.

use librarian_config::AppConfig;
use librarian_core::tool::ToolInfo;

pub async fn tools() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let agent = librarian_gateway::build_agent(&config);

    println!("Available tools");
    println!("===============");
    for info in agent.tools().infos() {
        println!();
        print!("{}", describe_tool(&info));
    }

    Ok(())
}

pub async fn models() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let agent = librarian_gateway::build_agent(&config);

    println!("Known models (default: {})", config.default_model);
    println!("============");
    for model in agent.gateway().models() {
        let marker = if model == config.default_model { "*" } else { " " };
        println!("  {marker} {model}");
    }
    println!();
    println!("  Any \"provider:model\" pair works if the provider is configured.");

    Ok(())
}

fn describe_tool(info: &ToolInfo) -> String {
    let mut out = format!("  {}\n    {}\n", info.name, info.description);
    for arg in &info.args_schema {
        let required = if arg.required { ", required" } else { "" };
        out.push_str(&format!("    - {} ({}{required})", arg.arg, arg.kind));
        if let Some(description) = &arg.description {
            out.push_str(&format!(": {description}"));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use librarian_core::tool::ToolArg;

    #[test]
    fn tool_description_lists_args() {
        let info = ToolInfo {
            name: "weather_lookup".into(),
            description: "Look up the weather".into(),
            args_schema: vec![ToolArg {
                arg: "location".into(),
                kind: "string".into(),
                description: Some("City name".into()),
                required: true,
            }],
        };
        let text = describe_tool(&info);
        assert!(text.starts_with("  weather_lookup\n"));
        assert!(text.contains("- location (string, required): City name"));
    }
}
