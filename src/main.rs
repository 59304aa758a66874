use clap::{Arg, ArgAction, Command};
use log::LevelFilter;
use sms_spam_inbox::backend::{
    build_backend, DirectBackend, HttpTransport, JsonTransport, ModelServing, PredictionBackend,
};
use sms_spam_inbox::config::{generate_default_config, load_config_if_present};
use sms_spam_inbox::{
    ClassificationController, Config, IconStyle, InboxClient, InboxSource, InboxView,
    PredictionRequest, StatusPresenter,
};
use std::process;
use std::sync::Arc;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let matches = Command::new("sms-spam-inbox")
        .version(env!("CARGO_PKG_VERSION"))
        .about("List an SMS inbox and classify messages as spam or ham")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path (defaults are used when it does not exist)")
                .default_value("sms-spam-inbox.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Write a default configuration file and exit")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("user")
                .short('u')
                .long("user")
                .value_name("ID")
                .help("Show the inbox of this user")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("classify-all")
                .long("classify-all")
                .help("Classify every message in the inbox")
                .requires("user")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("classify")
                .long("classify")
                .value_name("SMS_ID")
                .help("Classify a single message of the user")
                .requires("user")
                .conflicts_with("classify-all")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("text")
                .long("text")
                .value_name("TEXT")
                .help("Classify free text with the direct text-to-prediction backend")
                .conflicts_with("user")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("compact-icons")
                .long("compact-icons")
                .help("Render spam with the error icon")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        match generate_default_config(generate_path) {
            Ok(()) => println!("✅ Default configuration written to {generate_path}"),
            Err(e) => {
                eprintln!("Error writing configuration: {e:#}");
                process::exit(1);
            }
        }
        return;
    }

    let config = match resolve_config(matches.get_one::<String>("config")) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e:#}");
            process::exit(1);
        }
    };

    let style = if matches.get_flag("compact-icons") {
        IconStyle::Compact
    } else {
        config.icon_style
    };
    let presenter = StatusPresenter::new(style);

    let transport: Arc<dyn JsonTransport> = match HttpTransport::new(config.request_timeout()) {
        Ok(transport) => Arc::new(transport),
        Err(e) => {
            eprintln!("Error creating HTTP client: {e}");
            process::exit(1);
        }
    };

    let result = if let Some(text) = matches.get_one::<String>("text") {
        classify_text(&config, transport, presenter, text).await
    } else if let Some(user_id) = matches.get_one::<String>("user") {
        show_inbox(
            &config,
            transport,
            presenter,
            user_id,
            matches.get_one::<String>("classify").map(String::as_str),
            matches.get_flag("classify-all"),
        )
        .await
    } else {
        println!("(log in first: pass --user ID, or --text TEXT to classify free text.)");
        Ok(())
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn resolve_config(path: Option<&String>) -> anyhow::Result<Config> {
    let mut config = match path {
        Some(path) => load_config_if_present(path)?,
        None => Config::default(),
    };
    config.apply_env_overrides()?;
    config.validate()?;

    log::debug!(
        "Model version \"{}\"; backend mode \"{}\"",
        config.model_version,
        config.backend_mode
    );
    Ok(config)
}

async fn classify_text(
    config: &Config,
    transport: Arc<dyn JsonTransport>,
    presenter: StatusPresenter,
    text: &str,
) -> anyhow::Result<()> {
    let model = ModelServing::new(config.model_serving_base()?, config.model_version.clone());
    let backend: Arc<dyn PredictionBackend> = Arc::new(DirectBackend::new(model, transport));

    let controller = ClassificationController::for_request(PredictionRequest::new("", text), backend);
    let status = controller.classify().await;
    println!("{} {}", presenter.icon(status), text);
    Ok(())
}

async fn show_inbox(
    config: &Config,
    transport: Arc<dyn JsonTransport>,
    presenter: StatusPresenter,
    user_id: &str,
    classify_id: Option<&str>,
    classify_all: bool,
) -> anyhow::Result<()> {
    let backend = build_backend(config, transport.clone())?;
    let source: Arc<dyn InboxSource> = Arc::new(InboxClient::new(config.user_data_base()?, transport));

    if let Some(sms_id) = classify_id {
        let Some(message) = source.get_message(user_id, sms_id).await? else {
            anyhow::bail!("SMS {sms_id} not found for {user_id}");
        };
        let controller = ClassificationController::new(&message, backend);
        let status = controller.classify().await;
        println!(
            "{} [{}, {}] {}",
            presenter.icon(status),
            message.display_date(),
            message.sender,
            message.text
        );
        return Ok(());
    }

    let mut view = InboxView::new(user_id, source, backend, presenter);
    view.refresh().await?;
    if classify_all {
        view.classify_all().await;
    }

    println!("Welcome, {}", view.user_id());
    if !view.entries().is_empty() {
        println!("Your inbox:");
    }
    for line in view.render_lines() {
        println!("  {line}");
    }
    Ok(())
}
