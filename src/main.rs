mod check;
mod config;
mod drivers;
mod error;
mod prompt;
mod service;

use clap::{Parser, CommandFactory, FromArgMatches};
use config::Settings;
use service::EvaluationService;
use error::{InputField, ServiceError};
use anyhow::{Result, Context};
use std::process;
use std::io::Read;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
#[macro_use] extern crate rust_i18n;

i18n!("locales");

fn set_system_locale() {
    let locale = sys_locale::get_locale().unwrap_or_else(|| "en".to_string());
    let lang_code = locale.split(|c| c == '-' || c == '_').next().unwrap_or("en");

    let supported = ["en", "zh"];
    if supported.contains(&lang_code) {
        rust_i18n::set_locale(lang_code);
    } else {
        rust_i18n::set_locale("en");
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = None,
    disable_help_flag = true,
    disable_version_flag = true
)]
struct Args {
    /// Classroom content to evaluate ("-" reads stdin)
    #[arg(index = 1, value_name = "CONTENT")]
    input: Option<String>,

    /// Rating label
    #[arg(short = 'r', long)]
    rating: Option<String>,

    /// Provider to use
    #[arg(short = 's', long)]
    provider: Option<String>,

    /// List supported providers
    #[arg(short = 'l', long)]
    list: bool,

    /// Show current provider and evaluation limits
    #[arg(long)]
    show_config: bool,

    /// Run a sample evaluation against the active provider
    #[arg(long)]
    check: bool,

    /// Print help
    #[arg(short, long, action = clap::ArgAction::Help)]
    help: Option<bool>,

    /// Print version
    #[arg(short = 'V', long, action = clap::ArgAction::Version)]
    version: Option<bool>,

    /// Output JSON
    #[arg(short = 'j', long)]
    json: bool,

    /// Config file path
    #[arg(short = 'c', long)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

/// Prints `message` (as `{success:false,error}` in JSON mode) and exits with status 1.
fn fail(json: bool, message: &str) -> ! {
    if json {
        println!("{}", serde_json::json!({ "success": false, "error": message }));
    } else {
        eprintln!("{}", message);
    }
    process::exit(1);
}

fn provider_names(service: &EvaluationService) -> String {
    service.supported_providers().iter().map(|p| p.as_str()).collect::<Vec<_>>().join(", ")
}

/// Translated text for errors the user can correct.
fn user_message(err: &ServiceError, providers: &str) -> String {
    match err {
        ServiceError::InvalidInput(InputField::Content) => t!("content_required").to_string(),
        ServiceError::InvalidInput(InputField::Rating) => t!("rating_required").to_string(),
        ServiceError::UnsupportedProvider(name) => t!("unsupported_provider", provider = name, valid = providers).to_string(),
        ServiceError::ProviderFailure { .. } => t!("generation_failed").to_string(),
    }
}

/// Front-end checks made before the service is called. Returns the trimmed content and rating.
fn validate_input(settings: &Settings, content: &str, rating: Option<&str>) -> Result<(String, String), String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(t!("content_required").to_string());
    }

    let len = trimmed.chars().count();
    let limits = &settings.evaluation;
    if limits.min_length_enforced && len < limits.min_content_length {
        return Err(t!("content_too_short", min = limits.min_content_length).to_string());
    }
    if len > limits.max_content_length {
        return Err(t!("content_too_long", max = limits.max_content_length, len = len).to_string());
    }

    let rating = match rating.map(str::trim) {
        Some(r) if !r.is_empty() => r,
        _ => return Err(t!("rating_required").to_string()),
    };

    if !limits.enable_custom_rating && !settings.rating_prompts.contains_key(rating) {
        let mut valid: Vec<&str> = settings.rating_prompts.keys().map(String::as_str).collect();
        valid.sort();
        return Err(t!("rating_not_allowed", rating = rating, valid = valid.join(", ")).to_string());
    }

    Ok((trimmed.to_string(), rating.to_string()))
}

fn main() -> Result<()> {
    set_system_locale();

    let mut command = Args::command();
    command = command.about(t!("cli_description").to_string());

    let args_help = [
        ("input", "help_content"),
        ("rating", "help_rating"),
        ("provider", "help_provider"),
        ("list", "help_list"),
        ("show_config", "help_show_config"),
        ("check", "help_check"),
        ("help", "help_help"),
        ("version", "help_version"),
        ("json", "help_json"),
        ("config", "help_config"),
        ("verbose", "help_verbose"),
    ];

    for (arg_id, help_key) in args_help {
         let help_msg = t!(help_key).to_string();
         command = command.mut_arg(arg_id, |a| a.help(help_msg));
    }

    let matches = command.get_matches();
    let args = Args::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    init_logging(args.verbose);

    let settings = Settings::load(args.config.clone()).unwrap_or_else(|err| {
        fail(args.json, &t!("error_loading_config", error = format!("{:#}", err)))
    });

    let service = EvaluationService::new(Arc::new(settings));

    if let Some(name) = args.provider.as_deref() {
        if let Err(e) = service.set_provider(name) {
            tracing::warn!(error = %e, "provider switch rejected");
            fail(args.json, &user_message(&e, &provider_names(&service)));
        }
    }

    if args.list || args.show_config {
        let current = service.active_provider();
        if args.json {
            let output = serde_json::json!({
                "currentProvider": current,
                "supportedProviders": service.supported_providers(),
                "evaluationConfig": service.settings().evaluation,
            });
            println!("{}", output);
        } else {
            println!("{}", t!("supported_providers"));
            for provider in service.supported_providers() {
                let prefix = if *provider == current { "*" } else { "-" };
                let svc = service.settings().service(*provider);
                let key_state = if svc.api_key.is_some() { t!("key_configured") } else { t!("key_missing") };
                println!("{} {} (Model: {}) - {}", prefix, provider, svc.model, key_state);
            }
            if args.show_config {
                let limits = &service.settings().evaluation;
                println!();
                println!("{}", t!("evaluation_limits",
                    min = limits.min_content_length,
                    max = limits.max_content_length,
                    words = limits.default_word_count,
                    custom = limits.enable_custom_rating));
                let settings = service.settings();
                let mut ratings: Vec<&str> = settings.rating_prompts.keys()
                    .map(String::as_str)
                    .filter(|r| settings.guidance(r).is_some())
                    .collect();
                ratings.sort();
                println!("{}", t!("configured_ratings", ratings = ratings.join(", ")));
            }
        }
        return Ok(());
    }

    if args.check {
        if check::run(&service).is_err() {
            process::exit(1);
        }
        return Ok(());
    }

    let mut input_text = args.input;
    if let Some(p) = &input_text {
        if p == "-" {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer).context(t!("failed_read_stdin"))?;
            input_text = Some(buffer);
        }
    }

    let Some(content) = input_text else {
        if let Some(name) = args.provider.as_deref() {
            // Only a provider switch was requested
            if args.json {
                println!("{}", serde_json::json!({
                    "success": true,
                    "message": t!("provider_switched", provider = name).to_string(),
                    "currentProvider": service.active_provider(),
                }));
            } else {
                println!("{}", t!("provider_switched", provider = name));
            }
        } else {
            println!("{}", t!("cli_description"));
            println!("{}", t!("usage_info"));
            println!();
            println!("{}", t!("default_provider", provider = service.active_provider()));
        }
        return Ok(());
    };

    let (content, rating) = validate_input(service.settings(), &content, args.rating.as_deref())
        .unwrap_or_else(|msg| fail(args.json, &msg));

    match service.generate(&content, &rating) {
        Ok(evaluation) => {
            if args.json {
                println!("{}", serde_json::json!({ "success": true, "evaluation": evaluation }));
            } else {
                println!("{}", evaluation);
            }
        },
        Err(e) if e.is_user_error() => fail(args.json, &user_message(&e, &provider_names(&service))),
        // Details were logged by the service
        Err(_) => fail(args.json, &t!("generation_failed")),
    }

    Ok(())
}
