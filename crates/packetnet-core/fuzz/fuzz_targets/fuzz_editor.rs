#![no_main]
use arbitrary::Arbitrary;
use packetnet_core::config::SimConfig;
use packetnet_core::engine::{Engine, EngineError};
use packetnet_core::geom::Point;
use packetnet_core::id::*;
use packetnet_core::test_utils::*;
use packetnet_core::topology::*;
use libfuzzer_sys::fuzz_target;

/// A structured editor or run-control operation for fuzzing.
#[derive(Arbitrary, Debug)]
enum FuzzOp {
    AddSystem { kind: u8, x: i16, y: i16 },
    AddPort { system: u8, output: bool, shape: u8 },
    RemovePort { index: u8 },
    Connect { a: u8, b: u8 },
    Disconnect { index: u8 },
    MoveSystem { system: u8, x: i16, y: i16 },
    InsertWaypoint { wire: u8, index: u8, x: i16, y: i16 },
    DeleteWaypoint { wire: u8, index: u8 },
    Generator { system: u8, total: u8, period: u8 },
    Start,
    Tick,
    Reset,
}

/// Top-level fuzz input: a sequence of operations.
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    seed: u64,
    ops: Vec<FuzzOp>,
}

const KINDS: [SystemType; 9] = [
    SystemType::Source,
    SystemType::Sink,
    SystemType::Node,
    SystemType::AntiTrojan,
    SystemType::Distributor,
    SystemType::Merger,
    SystemType::Spy,
    SystemType::Corruptor,
    SystemType::Vpn,
];

const SHAPES: [Shape; 4] = [Shape::Square, Shape::Triangle, Shape::Circle, Shape::Any];

fn pick<T: Copy>(items: &[T], index: u8) -> Option<T> {
    (!items.is_empty()).then(|| items[index as usize % items.len()])
}

fn point(x: i16, y: i16) -> Point {
    Point::from_f64(f64::from(x), f64::from(y))
}

fuzz_target!(|input: FuzzInput| {
    let config = SimConfig {
        seed: input.seed,
        ..SimConfig::default()
    };
    let mut engine = Engine::new(config);
    let mut systems: Vec<SystemId> = Vec::new();

    // Limit operations to prevent timeouts.
    let max_ops = input.ops.len().min(200);

    for op in &input.ops[..max_ops] {
        let ports: Vec<PortId> = engine.topology().ports().map(|(id, _)| id).collect();
        let wires: Vec<WireId> = engine.topology().wires().map(|(id, _)| id).collect();
        let result = match *op {
            FuzzOp::AddSystem { kind, x, y } => engine
                .add_system(KINDS[kind as usize % KINDS.len()], point(x, y))
                .map(|id| systems.push(id)),
            FuzzOp::AddPort { system, output, shape } => match pick(&systems, system) {
                Some(s) => {
                    let direction = if output { PortDirection::Out } else { PortDirection::In };
                    engine
                        .add_port(s, direction, SHAPES[shape as usize % SHAPES.len()])
                        .map(|_| ())
                }
                None => Ok(()),
            },
            FuzzOp::RemovePort { index } => match pick(&ports, index) {
                Some(p) => engine.remove_port(p),
                None => Ok(()),
            },
            FuzzOp::Connect { a, b } => match (pick(&ports, a), pick(&ports, b)) {
                (Some(a), Some(b)) => engine.connect(a, b).map(|_| ()),
                _ => Ok(()),
            },
            FuzzOp::Disconnect { index } => match pick(&wires, index) {
                Some(w) => engine.disconnect(w),
                None => Ok(()),
            },
            FuzzOp::MoveSystem { system, x, y } => match pick(&systems, system) {
                Some(s) => engine.move_system(s, point(x, y)),
                None => Ok(()),
            },
            FuzzOp::InsertWaypoint { wire, index, x, y } => match pick(&wires, wire) {
                Some(w) => engine.insert_waypoint(w, index as usize, point(x, y)),
                None => Ok(()),
            },
            FuzzOp::DeleteWaypoint { wire, index } => match pick(&wires, wire) {
                Some(w) => engine.delete_waypoint(w, index as usize),
                None => Ok(()),
            },
            FuzzOp::Generator { system, total, period } => match pick(&systems, system) {
                Some(s) => engine.set_generator(s, schedule(u32::from(total % 8), u64::from(period) * 16)),
                None => Ok(()),
            },
            FuzzOp::Start => engine.start(),
            FuzzOp::Tick => engine.tick().map(|_| ()),
            FuzzOp::Reset => {
                engine.reset_for_level();
                Ok(())
            }
        };
        // Editor and run-control errors are fine; broken invariants are not.
        if let Err(EngineError::InvariantViolation(violation)) = result {
            panic!("invariant violated: {violation}");
        }
    }
});
