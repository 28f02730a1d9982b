mod commands;
mod terminal;

use anyhow::Context;
use commands::{CommandLine, Commands, ports, scan};
use sweepr_common::network::target;
use terminal::{logging, print};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();
    // Raw output is meant for pipes: no banner, headers or chatter.
    let quiet: u8 = match &commands.command {
        Commands::Scan(args) if args.raw => commands.quiet.max(1),
        _ => commands.quiet,
    };

    logging::init_logging(quiet);
    print::banner(quiet);

    match commands.command {
        Commands::Scan(args) => {
            let range = target::parse(&args.start, args.end.as_deref())
                .context("invalid scan target")?;
            let cfg = args.to_config(quiet);
            cfg.validate()?;

            print::header("getting ready to sweep", cfg.quiet);
            scan::scan(range, &cfg).await?;
        }
        Commands::Ports => ports::ports(quiet),
    }

    if quiet == 0 {
        print::end_of_program();
    }
    Ok(())
}
