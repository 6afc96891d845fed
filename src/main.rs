use anyhow::{anyhow, bail, Result};
use chrono::NaiveDate;

use vesselhire::api::{ApiClient, ApiError};
use vesselhire::config::Config;
use vesselhire::form::EntryForm;
use vesselhire::logging::{self, obj, v_str, Domain};
use vesselhire::models::{AggregateFilter, VesselFilter};
use vesselhire::route::{self, View};
use vesselhire::stats::{format_inr, summarize, vessel_names};

const USAGE: &str = "usage:
  vesselhire login <username> <password>
  vesselhire logout
  vesselhire status
  vesselhire vessels [--vessel NAME] [--from YYYY-MM-DD] [--to YYYY-MM-DD]
  vesselhire aggregate [--from YYYY-MM-DD] [--to YYYY-MM-DD]
  vesselhire add <vessel> <date> <hire_rate> <market_rate>
  vesselhire route <path>";

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env()?;
    let client = ApiClient::from_config(&cfg)?;
    logging::debug(
        Domain::System,
        "startup",
        obj(&[("api_base", v_str(cfg.api_base.as_str())), ("db", v_str(&cfg.sqlite_path))]),
    );

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((cmd, rest)) = args.split_first() else {
        println!("{}", USAGE);
        return Ok(());
    };

    let outcome = match cmd.as_str() {
        "login" => login(&client, rest).await,
        "logout" => client.logout().map_err(anyhow::Error::from),
        "status" => {
            status(&client);
            Ok(())
        }
        "vessels" => vessels(&client, rest).await,
        "aggregate" => aggregate(&client, rest).await,
        "add" => add(&client, rest).await,
        "route" => route_cmd(&client, rest),
        _ => {
            println!("{}", USAGE);
            Ok(())
        }
    };

    if let Err(err) = outcome {
        if let Some(api_err) = err.downcast_ref::<ApiError>() {
            eprintln!("{}", api_err.user_message());
            if api_err.requires_login() {
                eprintln!("redirect: {}", View::Login);
            }
            std::process::exit(1);
        }
        return Err(err);
    }
    Ok(())
}

async fn login(client: &ApiClient, args: &[String]) -> Result<()> {
    let [username, password] = args else {
        bail!("login needs <username> <password>");
    };
    let session = client.login(username, password).await?;
    let role = session.role.map(|r| r.as_str()).unwrap_or("none");
    println!("logged in as {} ({})", username, role);
    println!("landing: {}", route::resolve(View::Login, &session));
    Ok(())
}

fn status(client: &ApiClient) {
    let session = client.session();
    println!("authenticated: {}", session.is_authenticated());
    println!("role: {}", session.role.map(|r| r.as_str()).unwrap_or("none"));
    for view in [View::Root, View::Login, View::Dashboard, View::Admin] {
        println!("  {:<10} -> {}", view.path(), route::resolve(view, &session));
    }
}

async fn vessels(client: &ApiClient, args: &[String]) -> Result<()> {
    let flags = Flags::parse(args)?;
    let filter = VesselFilter {
        vessel: flags.vessel,
        start_date: flags.from,
        end_date: flags.to,
    };
    let rows = client.fetch_vessel_data(&filter).await?;
    for r in &rows {
        println!(
            "{}  {:<16} hire ₹ {:>14}  market ₹ {:>14}",
            r.date,
            r.vessel_name,
            format_inr(r.hire_rate),
            format_inr(r.market_rate)
        );
    }
    let summary = summarize(&rows);
    println!("data points: {}", summary.count);
    if let (Some(hire), Some(market)) = (summary.avg_hire, summary.avg_market) {
        println!("avg hire: ₹ {}  avg market: ₹ {}", format_inr(hire), format_inr(market));
    }
    println!("vessels: {}", vessel_names(&rows).join(", "));
    Ok(())
}

async fn aggregate(client: &ApiClient, args: &[String]) -> Result<()> {
    let flags = Flags::parse(args)?;
    let filter = AggregateFilter {
        start_date: flags.from,
        end_date: flags.to,
    };
    for row in client.fetch_aggregate(&filter).await? {
        println!(
            "{}  total hire ₹ {:>14}  total market ₹ {:>14}",
            row.date,
            format_inr(row.total_hire),
            format_inr(row.total_market)
        );
    }
    Ok(())
}

async fn add(client: &ApiClient, args: &[String]) -> Result<()> {
    let [vessel_name, date, hire_rate, market_rate] = args else {
        bail!("add needs <vessel> <date> <hire_rate> <market_rate>");
    };
    let session = client.session();
    if route::can_access(View::Admin, &session) != route::Access::Allow {
        bail!("admin access required");
    }
    let entry = EntryForm {
        vessel_name: vessel_name.clone(),
        date: date.clone(),
        hire_rate: hire_rate.clone(),
        market_rate: market_rate.clone(),
    }
    .validate()?;
    let created = client.submit(&entry).await?;
    println!(
        "added {} on {} (id {})",
        created.vessel_name,
        created.date,
        created.id.map(|id| id.to_string()).unwrap_or_else(|| "?".to_string())
    );
    Ok(())
}

fn route_cmd(client: &ApiClient, args: &[String]) -> Result<()> {
    let path = args.first().ok_or_else(|| anyhow!("route needs <path>"))?;
    let view = View::from_path(path).ok_or_else(|| anyhow!("unknown path {}", path))?;
    let session = client.session();
    println!("{:?}", route::can_access(view, &session));
    println!("renders: {}", route::resolve(view, &session));
    Ok(())
}

#[derive(Default)]
struct Flags {
    vessel: Option<String>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

impl Flags {
    fn parse(args: &[String]) -> Result<Self> {
        let mut flags = Flags::default();
        let mut it = args.iter();
        while let Some(flag) = it.next() {
            let value = it.next().ok_or_else(|| anyhow!("{} needs a value", flag))?;
            match flag.as_str() {
                "--vessel" => flags.vessel = Some(value.clone()),
                "--from" => flags.from = Some(parse_date(value)?),
                "--to" => flags.to = Some(parse_date(value)?),
                other => bail!("unknown flag {}", other),
            }
        }
        Ok(flags)
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| anyhow!("bad date {}: {}", raw, e))
}
