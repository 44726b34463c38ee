//! Single-server queue driven by expression-valued parameters.
//!
//! The source emits jobs with random inter-arrival times and the server processes them one at a time with a
//! bounded waiting queue. Both components read their timings from volatile parameters configured in JSON.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;

use evsim::par::{ParDecl, ParType, ParamSet};
use evsim::{cast, log_debug, log_info, log_warn};
use evsim::{Event, EventHandler, HandlerResult, Id, Simulation, SimulationConfig, SimulationContext};

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Args {
    /// Path to JSON configuration
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Random seed, overrides the configured one
    #[arg(long)]
    seed: Option<u64>,

    /// Simulation end time, overrides the configured one
    #[arg(long)]
    end_time: Option<f64>,
}

#[derive(Clone, Serialize)]
struct Generate {}

#[derive(Clone, Serialize)]
struct Job {
    id: u64,
    created: f64,
}

#[derive(Clone, Serialize)]
struct ServiceDone {}

struct Source {
    ctx: SimulationContext,
    params: ParamSet,
    server: Id,
    generated: u64,
}

impl Source {
    fn new(ctx: SimulationContext, server: Id, config: &SimulationConfig) -> anyhow::Result<Self> {
        let mut params = ParamSet::for_context(&ctx);
        params.declare(ParDecl::new("mean_interval", ParType::Double).unit("s").default_value("1.0"))?;
        params.declare(ParDecl::new("interval", ParType::Double).unit("s").volatile())?;
        params.initialize(&config.parameters)?;
        Ok(Self {
            ctx,
            params,
            server,
            generated: 0,
        })
    }

    fn start(&self) {
        self.ctx.emit_self_now(Generate {});
    }
}

impl EventHandler for Source {
    fn on(&mut self, event: Event) -> HandlerResult {
        cast!(match event.data {
            Generate {} => {
                let job = Job {
                    id: self.generated,
                    created: self.ctx.time(),
                };
                self.generated += 1;
                self.ctx.emit_now(job, self.server);
                let interval = self.params.double("interval")?;
                self.ctx.emit_self(Generate {}, interval);
            }
        });
        Ok(())
    }
}

#[derive(Default)]
struct Stats {
    served: u64,
    dropped: u64,
    total_response: f64,
    max_queue: usize,
}

struct Server {
    ctx: SimulationContext,
    params: ParamSet,
    queue: VecDeque<Job>,
    in_service: Option<Job>,
    stats: Stats,
}

impl Server {
    fn new(ctx: SimulationContext, config: &SimulationConfig) -> anyhow::Result<Self> {
        let mut params = ParamSet::for_context(&ctx);
        params.declare(ParDecl::new("slowdown", ParType::Double).default_value("1.0"))?;
        params.declare(ParDecl::new("service_time", ParType::Double).unit("s").volatile())?;
        params.declare(ParDecl::new("capacity", ParType::Long).constant().default_value("10"))?;
        params.initialize(&config.parameters)?;
        for par in params.iter() {
            log_debug!(ctx, "{}", par);
        }
        Ok(Self {
            ctx,
            params,
            queue: VecDeque::new(),
            in_service: None,
            stats: Stats::default(),
        })
    }

    fn start_service(&mut self, job: Job) -> anyhow::Result<()> {
        let service_time = self.params.double("service_time")?;
        log_debug!(self.ctx, "job {} takes {:.3}", job.id, service_time);
        self.in_service = Some(job);
        self.ctx.emit_self(ServiceDone {}, service_time);
        Ok(())
    }

    fn on_job(&mut self, job: Job) -> anyhow::Result<()> {
        if self.in_service.is_none() {
            return self.start_service(job);
        }
        let capacity = self.params.long("capacity")?;
        if self.queue.len() as i64 >= capacity {
            log_warn!(self.ctx, "queue is full, dropping job {}", job.id);
            self.stats.dropped += 1;
        } else {
            self.queue.push_back(job);
            self.stats.max_queue = self.stats.max_queue.max(self.queue.len());
        }
        Ok(())
    }

    fn on_service_done(&mut self) -> anyhow::Result<()> {
        let job = self
            .in_service
            .take()
            .context("service completed while the server is idle")?;
        self.stats.served += 1;
        self.stats.total_response += self.ctx.time() - job.created;
        match self.queue.pop_front() {
            Some(next) => self.start_service(next),
            None => Ok(()),
        }
    }
}

impl EventHandler for Server {
    fn on(&mut self, event: Event) -> HandlerResult {
        cast!(match event.data {
            Job { id, created } => {
                self.on_job(Job { id, created })?;
            }
            ServiceDone {} => {
                self.on_service_done()?;
            }
        });
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();

    let args = Args::parse();
    let text = std::fs::read_to_string(&args.config)
        .with_context(|| format!("cannot read configuration {}", args.config.display()))?;
    let mut config = SimulationConfig::from_json(&text)?;
    log::info!(
        "Loaded {} parameter assignments from {}",
        config.parameters.len(),
        args.config.display()
    );
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(end_time) = args.end_time {
        config.end_time = Some(end_time);
    }

    let mut sim = Simulation::with_config(&config);
    let server = Rc::new(RefCell::new(Server::new(sim.create_context("server"), &config)?));
    let server_id = sim.add_handler("server", server.clone());
    let source = Rc::new(RefCell::new(Source::new(
        sim.create_context("source"),
        server_id,
        &config,
    )?));
    sim.add_handler("source", source.clone());

    source.borrow().start();
    let outcome = sim.run()?;

    let server = server.borrow();
    let stats = &server.stats;
    log_info!(server.ctx, "stopped: {:?}", outcome);
    println!("Simulation time: {:.2}", sim.time());
    println!("Processed events: {}", sim.processed_count());
    println!("Generated jobs: {}", source.borrow().generated);
    println!("Served jobs: {}", stats.served);
    println!("Dropped jobs: {}", stats.dropped);
    println!("Max queue length: {}", stats.max_queue);
    if stats.served > 0 {
        println!("Mean response time: {:.3}", stats.total_response / stats.served as f64);
    }
    Ok(())
}
