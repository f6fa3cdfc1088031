use clap::Subcommand;
use passline_api::ClaimSet;
use passline_runtime::PasslineRuntime;
use serde_json::Value;

use crate::{exit_rejected, pout};

#[derive(Debug, Subcommand)]
pub enum TokenCommands {
    /// Issue a signed token (requires --claim userName=...)
    Issue {
        #[arg(long = "claim", value_parser = parse_claim)]
        claims: Vec<(String, Value)>,
    },
    /// Issue a token and hand it to the configured publisher
    Publish {
        #[arg(long = "claim", value_parser = parse_claim)]
        claims: Vec<(String, Value)>,
    },
    /// Verify a compact token and print its claims
    Verify { token: String },
}

pub fn cmd_token(
    runtime: &PasslineRuntime,
    command: TokenCommands,
    json: bool,
) -> anyhow::Result<()> {
    let outcome = match command {
        TokenCommands::Issue { claims } => runtime.issue_response(claim_set(claims)),
        TokenCommands::Publish { claims } => runtime.publish_response(claim_set(claims)),
        TokenCommands::Verify { token } => runtime.verify_response(&token),
    };

    match outcome {
        Ok(response) => {
            let text = response
                .jwt
                .clone()
                .unwrap_or_else(|| "Token verified".to_string());
            pout(json, serde_json::to_value(&response)?, &text)
        }
        Err(rejection) => exit_rejected(json, &rejection),
    }
}

fn claim_set(claims: Vec<(String, Value)>) -> ClaimSet {
    claims.into_iter().collect()
}

/// `KEY=VALUE`. VALUE is read as JSON when it parses (numbers, booleans), else as a string.
fn parse_claim(s: &str) -> Result<(String, Value), String> {
    let (key, raw) = s.split_once('=').ok_or_else(|| "must be KEY=VALUE".to_string())?;
    if key.is_empty() {
        return Err("claim name must not be empty".to_string());
    }
    let value = match serde_json::from_str::<Value>(raw) {
        Ok(v @ (Value::Number(_) | Value::Bool(_))) => v,
        _ => Value::String(raw.to_string()),
    };
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn claim_values() {
        assert_eq!(parse_claim("userName=anna").unwrap(), ("userName".to_string(), json!("anna")));
        assert_eq!(parse_claim("n=3").unwrap().1, json!(3));
        assert_eq!(parse_claim("ok=true").unwrap().1, json!(true));
        assert_eq!(parse_claim("expr=a=b").unwrap().1, json!("a=b"));
        assert!(parse_claim("novalue").is_err());
        assert!(parse_claim("=x").is_err());
    }
}
