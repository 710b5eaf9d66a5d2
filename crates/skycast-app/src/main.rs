mod app;
mod reminder;

use anyhow::Result;

const USAGE: &str = "\
skycast - weather lookups that survive going offline

Usage:
  skycast <city>       look up current weather for a city
  skycast              look up weather for this machine's location
  skycast --queue <city>  hand a lookup to the background worker
  skycast --push [json]   render a push payload
  skycast --recent     show recent searches
  skycast --pending    show queued lookups
  skycast --daemon     run the background worker until interrupted
";

#[tokio::main]
async fn main() -> Result<()> {
    skycast_core::init()?;

    let (config, _validation) = skycast_core::Config::load_validated()?;
    let app = app::App::new(config)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("--help" | "-h") => {
            print!("{}", USAGE);
            Ok(())
        }
        Some("--recent") => app.show_recent(),
        Some("--pending") => app.show_pending(),
        Some("--daemon") => app.run_daemon().await,
        Some("--queue") => {
            let city = args[1..].join(" ");
            if city.is_empty() {
                print!("{}", USAGE);
                return Ok(());
            }
            app.queue_via_worker(&city)
        }
        Some("--push") => app.deliver_push(args.get(1).map(String::as_str)),
        Some(flag) if flag.starts_with("--") => {
            eprintln!("Unknown option: {}\n", flag);
            print!("{}", USAGE);
            Ok(())
        }
        Some(_) => app.search(&args.join(" ")).await,
        None => app.locate().await,
    }
}
