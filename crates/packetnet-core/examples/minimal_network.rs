//! Minimal network example: one source wired to one sink.
//!
//! Builds the level through editor commands, previews it with the
//! prediction engine, then runs it live and prints each delivery.
//!
//! Run with: `cargo run -p packetnet-core --example minimal_network`

use packetnet_core::config::SimConfig;
use packetnet_core::engine::{Engine, EngineError};
use packetnet_core::event::{Event, EventKind};
use packetnet_core::fixed::fixed64_to_f64;
use packetnet_core::geom::Point;
use packetnet_core::packet::PacketTemplate;
use packetnet_core::query::PacketStatus;
use packetnet_core::topology::{GeneratorSchedule, PortDirection, Shape, SystemType};

fn main() -> Result<(), EngineError> {
    let mut engine = Engine::new(SimConfig::default());

    // --- Step 1: Place systems and ports ---

    let source = engine.add_system(SystemType::Source, Point::from_f64(0.0, 0.0))?;
    let sink = engine.add_system(SystemType::Sink, Point::from_f64(160.0, 0.0))?;
    let out = engine.add_port(source, PortDirection::Out, Shape::Square)?;
    let inp = engine.add_port(sink, PortDirection::In, Shape::Square)?;

    // --- Step 2: Wire them and schedule packets ---

    let wire = engine.connect(out, inp)?;
    engine.set_generator(
        source,
        GeneratorSchedule {
            total: 3,
            period_ms: 500,
            template: PacketTemplate::normal(),
        },
    )?;
    if let Some(data) = engine.topology().wire(wire) {
        println!("wire length: {:.1} units", fixed64_to_f64(data.length()));
    }
    println!(
        "fully wired: {}, connected: {}",
        engine.topology().is_network_fully_wired(),
        engine.topology().is_topologically_connected()
    );

    // --- Step 3: Preview the first two seconds ---

    let preview = engine.predict_run(2000)?;
    println!(
        "preview after {} ticks: {} delivered, {} pending",
        preview.ticks_run,
        preview
            .packets
            .iter()
            .filter(|p| p.status == PacketStatus::Delivered)
            .count(),
        preview
            .packets
            .iter()
            .filter(|p| p.status == PacketStatus::NotYetGenerated)
            .count()
    );

    // --- Step 4: Run it live ---

    engine.on_passive(
        EventKind::PacketDelivered,
        Box::new(|event| {
            if let Event::PacketDelivered { packet, size, tick, .. } = event {
                println!("tick {tick}: delivered {packet:?} ({size} units)");
            }
        }),
    );
    engine.start()?;
    let ticks = engine.run_to_completion(10_000)?;

    let stats = engine.stats();
    println!(
        "finished after {ticks} ticks: {} / {} units delivered, {} coins, {:.1}% lost",
        stats.delivered_units,
        stats.generated_units,
        stats.coins,
        fixed64_to_f64(stats.loss_percent())
    );
    Ok(())
}
