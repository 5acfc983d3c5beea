use clap::Args;

use super::{clock, CalendarArgs, CliResult};

#[derive(Args)]
pub struct GapsArgs {
    #[command(flatten)]
    pub calendar: CalendarArgs,
    /// Print slots as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: GapsArgs) -> CliResult {
    let config = args.calendar.load_config()?;
    let offset = config.utc_offset()?;
    let date = args.calendar.date_or_today(offset);
    let calendar = args.calendar.source(offset)?;

    let runtime = tokio::runtime::Runtime::new()?;
    let events = runtime.block_on(calendar.fetch_events(&args.calendar.user, date))?;

    let slots = config
        .gap_finder()?
        .find_gaps_on(&events, date, &config.working_hours()?)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&slots)?);
        return Ok(());
    }

    println!("{} events, {} slots on {date}", events.len(), slots.len());
    for slot in &slots {
        println!(
            "  {}  {}-{}  {:>4} min  {:<16} {}",
            slot.id,
            clock(slot.start_time, offset),
            clock(slot.end_time, offset),
            slot.duration_minutes(),
            slot.gap_type.as_str(),
            slot.size.as_str()
        );
    }
    Ok(())
}
