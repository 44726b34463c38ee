use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use evsim::expr::{EvalContext, EvalError, Expression};
use evsim::par::{
    CellFlags, CellPool, Par, ParDecl, ParErrorKind, ParObserver, ParState, ParType, ParamSet, Value, ValueCell,
};
use evsim::{ParAssignments, Simulation, SimulationConfig};

#[test]
fn long_cell_reads_as_double_but_not_as_string() {
    let cell = ValueCell::literal(42i64);
    assert!(cell.flags().contains(CellFlags::IS_SET | CellFlags::CONTAINS_VALUE));
    assert_eq!(cell.double_value(None).unwrap(), 42.0);
    assert_eq!(
        cell.string_value(None).unwrap_err().kind,
        ParErrorKind::BadCast {
            from: ParType::Long,
            to: ParType::String
        }
    );
}

#[test]
fn string_expression_reports_unresolved_name() {
    let cell = ValueCell::expression(ParType::String, Expression::parse("prefix + \"-1\"").unwrap());
    let vars: HashMap<String, Value> = HashMap::new();
    let ctx: &dyn EvalContext = &vars;
    let err = cell.string_value(Some(ctx)).unwrap_err();
    assert_eq!(err.kind, ParErrorKind::Eval(EvalError::UnresolvedName("prefix".into())));
    assert_eq!(cell.str_value().unwrap_err().kind, ParErrorKind::VolatileAccess);
}

#[test]
fn constant_expression_converts_to_literal() {
    let mut cell = ValueCell::expression(ParType::Long, Expression::parse("2*3").unwrap());
    assert!(cell.is_expression());
    cell.convert_to_const(None).unwrap();
    assert!(!cell.is_expression());
    assert_eq!(cell.long_value(None).unwrap(), 6);
    assert_eq!(cell.to_string(), "6");
}

#[test]
fn writes_to_shared_cell_do_not_leak() {
    let mut pool = CellPool::new();
    let mut assignments = ParAssignments::new();
    assignments.push("**.delay", "base * 2").unwrap();

    let mut sets: Vec<ParamSet> = ["a", "b"]
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let mut set = ParamSet::new(i as u32, name);
            set.declare(ParDecl::new("base", ParType::Double).default_value("1.5"))
                .unwrap();
            set.declare(ParDecl::new("delay", ParType::Double).volatile())
                .unwrap();
            set
        })
        .collect();
    for set in sets.iter_mut() {
        set.apply_config_with(&assignments, &mut pool).unwrap();
        set.finalize().unwrap();
    }
    assert_eq!(pool.hits(), 1);
    assert!(sets[0].par("delay").unwrap().is_shared());
    assert!(Rc::ptr_eq(
        sets[0].par("delay").unwrap().cell(),
        sets[1].par("delay").unwrap().cell()
    ));

    sets[0].parse("delay", "base + 1").unwrap();
    assert_eq!(sets[0].double("delay").unwrap(), 2.5);
    assert_eq!(sets[1].double("delay").unwrap(), 3.0);
}

#[test]
fn assigned_handles_share_until_written() {
    let mut a = Par::new(ParDecl::new("x", ParType::Long), 0, "a").unwrap();
    let mut b = Par::new(ParDecl::new("x", ParType::Long), 1, "b").unwrap();
    a.set_long(5).unwrap();
    b.assign(&a).unwrap();
    assert!(a.is_shared() && b.is_shared());
    assert!(a.flags().contains(CellFlags::IS_SHARED));

    b.set_expression(Expression::parse("10 + 1").unwrap(), None).unwrap();
    assert_eq!(a.long_value(None).unwrap(), 5);
    assert_eq!(b.long_value(None).unwrap(), 11);
    assert!(!a.is_shared());
}

#[test]
fn parameter_lifecycle_and_immutability() {
    let mut par = Par::new(ParDecl::new("capacity", ParType::Long).constant().default_value("8"), 0, "queue").unwrap();
    assert_eq!(par.state(), ParState::Uninitialized);
    assert!(par.contains_value());
    assert!(!par.is_set());

    par.finalize(None).unwrap();
    assert_eq!(par.state(), ParState::Finalized);
    assert_eq!(par.long_value(None).unwrap(), 8);

    let err = par.set_long(16).unwrap_err();
    assert_eq!(err.kind, ParErrorKind::Immutable);
    assert_eq!(err.par.as_deref(), Some("queue.capacity"));
    assert_eq!(par.long_value(None).unwrap(), 8);

    let mut missing = Par::new(ParDecl::new("rate", ParType::Double), 0, "queue").unwrap();
    assert_eq!(missing.finalize(None).unwrap_err().kind, ParErrorKind::NotSet);
    assert_eq!(missing.state(), ParState::Uninitialized);
}

#[derive(Default)]
struct Changes(RefCell<Vec<String>>);

impl ParObserver for Changes {
    fn after_change(&self, par: &Par) {
        self.0.borrow_mut().push(format!("{} = {}", par.full_name(), par.str()));
    }
}

#[test]
fn observer_sees_configured_and_explicit_changes() {
    let changes = Rc::new(Changes::default());
    let mut set = ParamSet::new(0, "src");
    set.declare(ParDecl::new("count", ParType::Long)).unwrap();
    set.set_observer(changes.clone());
    set.declare(ParDecl::new("label", ParType::String).default_value("\"x\""))
        .unwrap();
    set.declare(ParDecl::new("limit", ParType::Long).default_value("9"))
        .unwrap();

    let mut assignments = ParAssignments::new();
    assignments.push("src.count", "3").unwrap();
    assignments.push("src.limit", "default").unwrap();
    set.initialize(&assignments).unwrap();
    set.set("count", 4i64).unwrap();
    assert!(set.set("count", "four").is_err());

    assert_eq!(
        *changes.0.borrow(),
        vec![
            "src.count = 3",
            "src.limit = 9",
            "src.label = \"x\"",
            "src.count = 4"
        ]
    );
}

#[test]
fn ask_and_bad_config_name_the_parameter() {
    let mut set = ParamSet::new(0, "server");
    set.declare(ParDecl::new("rate", ParType::Double)).unwrap();

    let mut assignments = ParAssignments::new();
    assignments.push("server.rate", "ask").unwrap();
    let err = set.initialize(&assignments).unwrap_err();
    assert_eq!(err.kind, ParErrorKind::AskNotSupported);
    assert!(err.to_string().starts_with("server.rate: "));

    let mut assignments = ParAssignments::new();
    assignments.push("server.rate", "1 +").unwrap();
    let err = set.initialize(&assignments).unwrap_err();
    assert!(matches!(err.kind, ParErrorKind::Syntax(_)));
    assert_eq!(err.par.as_deref(), Some("server.rate"));
}

#[test]
fn volatile_parameters_draw_from_simulation_generator() {
    let config = SimulationConfig::from_json(
        r#"{
            "seed": 5,
            "parameters": [
                { "pattern": "node.delay", "value": "uniform(0, limit) + index" },
                { "pattern": "**.limit", "value": "default" }
            ]
        }"#,
    )
    .unwrap();

    let draw = |config: &SimulationConfig| {
        let mut sim = Simulation::with_config(config);
        let ctx = sim.create_context("node");
        let mut params = ParamSet::for_context(&ctx);
        params.set_index(2);
        params.declare(ParDecl::new("limit", ParType::Double).default_value("1.0"))
            .unwrap();
        params.declare(ParDecl::new("delay", ParType::Double).volatile().unit("s"))
            .unwrap();
        params.initialize(&config.parameters).unwrap();
        (0..5).map(|_| params.double("delay").unwrap()).collect::<Vec<_>>()
    };

    let values = draw(&config);
    assert!(values.iter().all(|v| (2.0..3.0).contains(v)));
    assert!(values.windows(2).any(|w| w[0] != w[1]));
    assert_eq!(values, draw(&config));
}
