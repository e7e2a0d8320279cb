use std::path::PathBuf;

use clap::Parser;

use invoicr::batch;
use invoicr::error::ContextError;
use invoicr::renderer::InvoiceRenderer;
use invoicr::settings::RenderSettings;

#[derive(Parser, Debug)]
#[command(version, long_about = None)]
struct CliArguments {
    #[arg(
        short = 'c',
        long = "count",
        value_name = "invoices",
        default_value_t = 3,
        help = "How many invoices to generate"
    )]
    invoice_count: usize,
    #[arg(
        short = 's',
        long = "seed",
        value_name = "number",
        default_value_t = 10,
        help = "Seed for the invoice generator, the same seed regenerates the same batch"
    )]
    seed: u64,
    #[arg(long = "parallel", help = "Render on the rayon worker pool")]
    parallel: bool,
    #[arg(
        long = "settings",
        value_name = "json_file",
        help = "Path to a settings file, the defaults are used without one"
    )]
    settings_path: Option<PathBuf>,
    #[arg(
        long = "fixture",
        value_name = "json_file",
        help = "Render the invoices from this fixture instead of generating them"
    )]
    fixture_path: Option<PathBuf>,
    #[arg(long = "keep", help = "Keep the rendered files instead of sweeping them after the run")]
    keep: bool,
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help = "Log more, once for debug and twice for trace"
    )]
    verbosity: u8,
}

fn main() {
    if let Err(error) = fallible_main() {
        log::error!("{}", error);
        std::process::exit(1);
    }
}

fn fallible_main() -> Result<(), ContextError> {
    let arguments = CliArguments::parse();
    let filter_level = match arguments.verbosity {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::builder().filter_level(filter_level).init();
    log::debug!("{:?}", arguments);

    let settings = match &arguments.settings_path {
        Some(settings_path) => RenderSettings::from_path(settings_path)?,
        None => RenderSettings::default(),
    };
    let renderer = InvoiceRenderer::new(settings)?;

    let invoices = match &arguments.fixture_path {
        Some(fixture_path) => {
            let invoices = batch::load_invoices(fixture_path)?;
            log::info!("Loaded {} invoices from {:?}", invoices.len(), fixture_path);
            invoices
        }
        None => {
            let customer_names =
                batch::load_customer_names(&renderer.settings.data_directory)?;
            let invoices =
                batch::generate_invoices(arguments.invoice_count, arguments.seed, &customer_names)?;
            log::info!(
                "Generated {} invoices with the seed {}",
                invoices.len(),
                arguments.seed
            );
            invoices
        }
    };

    let output_paths = if arguments.parallel {
        batch::render_batch_parallel(&renderer, &invoices)?
    } else {
        batch::render_batch(&renderer, &invoices)?
    };
    log::info!(
        "Rendered {} invoices into {:?}",
        output_paths.len(),
        renderer.settings.output_directory
    );

    if arguments.keep {
        for output_path in &output_paths {
            log::info!("Kept {:?}", output_path);
        }
    } else {
        let removed_count = batch::delete_all_invoices(&renderer.settings.output_directory)?;
        log::info!("Swept {} rendered files, pass --keep to keep them", removed_count);
    }

    Ok(())
}
