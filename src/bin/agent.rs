use clap::Parser;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tool_router_agent::{
    config::AgentConfig,
    llm::OllamaClient,
    memory::Message,
    models::{RoutingState, ToolChoice},
    tools::TavilySearch,
    ConversationalAgent, RoutingAgent,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Multi-tool agent: routes questions to web search, a calculator, or a direct answer
#[derive(Parser, Debug)]
#[command(name = "agent", version)]
struct Cli {
    /// Question to ask (starts interactive mode when omitted)
    question: Option<String>,

    /// Start interactive mode
    #[arg(short, long)]
    interactive: bool,

    /// Interactive chat that remembers earlier turns
    #[arg(short, long, conflicts_with = "question")]
    memory: bool,
}

const BANNER: &str = r#"
+----------------------------------------------------------------------+
|                        Multi-Tool Agent CLI                          |
|                                                                      |
|  Ask me anything! I can:                                             |
|  - Search the web for current information                            |
|  - Calculate mathematical expressions                                |
|  - Answer general knowledge questions                                |
|                                                                      |
|  Commands:                                                           |
|  - 'quit', 'exit' or 'q' - Exit the program                          |
|  - 'help' - Show this message                                        |
|  - 'clear' - Clear screen                                            |
+----------------------------------------------------------------------+
"#;

const HELP: &str = r#"
HELP

Example questions:
  Math:        "What is 25 * 17 + 100?"
  Web Search:  "What happened in AI this week?"
  Knowledge:   "What is Python?"

The agent will automatically choose the right tool!

Commands:
  quit, exit, q - Exit the program
  help          - Show this message
  clear         - Clear the screen
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Quit,
    Help,
    Clear,
}

fn parse_command(input: &str) -> Option<Command> {
    match input.trim().to_lowercase().as_str() {
        "quit" | "exit" | "q" => Some(Command::Quit),
        "help" => Some(Command::Help),
        "clear" => Some(Command::Clear),
        _ => None,
    }
}

fn format_result(state: &RoutingState) -> String {
    let tool = state
        .tool_choice
        .map(ToolChoice::label)
        .unwrap_or("unknown");
    let rule = "─".repeat(70);

    format!(
        "\nTool used: {}\n{}\n{}\n{}\n",
        tool,
        rule,
        state.final_answer.as_deref().unwrap_or_default(),
        rule
    )
}

fn clear_screen() {
    print!("\x1B[2J\x1B[1;1H");
    let _ = std::io::stdout().flush();
}

fn print_remediation(model: &str) {
    eprintln!("Make sure Ollama is running and the model is installed:");
    eprintln!("   ollama pull {}", model);
    eprintln!("   ollama serve  (if not running)");
}

/// One REPL backend: stateless routing, or chat with carried history
enum Session {
    Routing(RoutingAgent),
    Chat {
        agent: ConversationalAgent,
        history: Vec<Message>,
    },
}

impl Session {
    async fn ask(&mut self, question: &str) -> tool_router_agent::Result<String> {
        match self {
            Session::Routing(agent) => {
                let state = agent.invoke(question).await?;
                Ok(format_result(&state))
            }
            Session::Chat { agent, history } => {
                let answer = agent.respond(history, question).await?;
                Ok(format!("\n{}\n", answer))
            }
        }
    }

    fn reset(&mut self) {
        if let Session::Chat { history, .. } = self {
            history.clear();
        }
    }
}

async fn run_interactive(mut session: Session) -> std::io::Result<()> {
    clear_screen();
    println!("{}", BANNER);
    println!("Agent ready! Type 'help' for instructions.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut question_count = 0usize;

    loop {
        print!("\nYou: ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };

        let Some(line) = line else {
            println!("\nGoodbye!");
            break;
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match parse_command(input) {
            Some(Command::Quit) => {
                println!("\nGoodbye!");
                break;
            }
            Some(Command::Help) => {
                println!("{}", HELP);
                continue;
            }
            Some(Command::Clear) => {
                session.reset();
                clear_screen();
                println!("{}", BANNER);
                continue;
            }
            None => {}
        }

        println!("\nAgent: Thinking...");

        match session.ask(input).await {
            Ok(rendered) => {
                println!("{}", rendered);
                question_count += 1;
            }
            Err(e) => {
                println!("\nError: {}", e);
                println!("Please try again or type 'quit' to exit.");
            }
        }
    }

    if question_count > 0 {
        println!("\nSession summary: {} questions answered", question_count);
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let config = match AgentConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    // Initialize tracing
    let default_level = if config.debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    for issue in config.validate() {
        eprintln!("Warning: {} (web search will be unavailable)", issue);
    }

    let llm = OllamaClient::from_config(&config)?;
    if let Err(e) = llm.health_check().await {
        eprintln!("Error initializing agent: {}", e);
        print_remediation(&config.ollama_model);
        return Ok(ExitCode::FAILURE);
    }

    info!(model = %config.ollama_model, url = %config.ollama_base_url, "Agent initialized");

    let llm = Arc::new(llm);

    if cli.memory {
        let session = Session::Chat {
            agent: ConversationalAgent::new(llm),
            history: Vec::new(),
        };
        run_interactive(session).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let search = Arc::new(TavilySearch::new(config.tavily_api_key.clone()));
    let agent = RoutingAgent::new(llm, search);

    match cli.question {
        Some(question) if !cli.interactive => {
            println!("\nQuestion: {}\n", question);

            match agent.invoke(&question).await {
                Ok(state) => {
                    println!("Answer: {}", state.final_answer.as_deref().unwrap_or_default());
                    if let Some(tool) = state.tool_choice {
                        println!("\n(Used tool: {})\n", tool);
                    }
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    eprintln!("Agent failed: {}", e);
                    print_remediation(&config.ollama_model);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        _ => {
            run_interactive(Session::Routing(agent)).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tool_router_agent::models::{RoutingNode, RoutingUpdate};

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("quit"), Some(Command::Quit));
        assert_eq!(parse_command("EXIT"), Some(Command::Quit));
        assert_eq!(parse_command(" q "), Some(Command::Quit));
        assert_eq!(parse_command("help"), Some(Command::Help));
        assert_eq!(parse_command("clear"), Some(Command::Clear));
        assert_eq!(parse_command("what is 2 + 2?"), None);
        assert_eq!(parse_command("quit now"), None);
    }

    #[test]
    fn test_format_result() {
        let mut state = RoutingState::new("What is 2 + 2?");
        state
            .apply(RoutingNode::Router, RoutingUpdate::tool_choice(ToolChoice::Calculator))
            .unwrap();
        state
            .apply(RoutingNode::Calculator, RoutingUpdate::tool_output("Calculation: 2 + 2 = 4"))
            .unwrap();
        state
            .apply(RoutingNode::Synthesizer, RoutingUpdate::final_answer("It is 4."))
            .unwrap();

        let rendered = format_result(&state);
        assert!(rendered.contains("Tool used: calculator"));
        assert!(rendered.contains("It is 4."));
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["agent", "What is Python?"]).unwrap();
        assert_eq!(cli.question.as_deref(), Some("What is Python?"));
        assert!(!cli.interactive);

        let cli = Cli::try_parse_from(["agent", "-i"]).unwrap();
        assert!(cli.interactive);
        assert!(cli.question.is_none());

        let cli = Cli::try_parse_from(["agent", "--memory"]).unwrap();
        assert!(cli.memory);
    }

    #[test]
    fn test_memory_mode_rejects_question() {
        let err = Cli::try_parse_from(["agent", "-m", "What is Python?"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }
}
