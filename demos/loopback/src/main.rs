//! Loopback demo: two microlink endpoints moving a random file across a
//! simulated serial line that loses, delays and corrupts frames.
//!
//! Time is virtual. The loop jumps from one event (frame arrival or host
//! wakeup) to the next, so a long transfer finishes instantly.
//!
//! ```text
//! RUST_LOG=microlink=debug cargo run -p microlink-loopback -- --size 50000 --loss 0.1
//! ```

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use anyhow::{Context, Result, bail, ensure};
use clap::Parser;
use microlink::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "microlink-loopback")]
#[command(about = "Transfer a file between two endpoints over a lossy simulated line", long_about = None)]
#[command(version)]
struct Args {
    /// File size in bytes
    #[arg(short, long, default_value_t = 20_000)]
    size: u32,

    /// Probability that a frame is lost
    #[arg(long, default_value_t = 0.05)]
    loss: f64,

    /// Probability that a delivered frame has one bit flipped
    #[arg(long, default_value_t = 0.01)]
    corrupt: f64,

    /// Ticks a frame spends on the line
    #[arg(long, default_value_t = 2)]
    latency: Tick,

    /// Chunk size proposed by the sender
    #[arg(long, default_value_t = 250)]
    mtu: u16,

    /// Lower pacing bound proposed by the sender
    #[arg(long, default_value_t = 7)]
    dt_min: u32,

    /// Upper pacing bound proposed by the sender
    #[arg(long, default_value_t = 10)]
    dt_max: u32,

    /// Seed for data, losses and session ids
    #[arg(long)]
    seed: Option<u64>,

    /// Give up after this many ticks
    #[arg(long, default_value_t = 10_000_000)]
    limit: Tick,
}

type Clock = Rc<Cell<Tick>>;

/// Host side of one link: virtual clock, single wakeup, outgoing frames.
struct Host {
    clock: Clock,
    wakeup: Option<Tick>,
    outbox: Vec<Vec<u8>>,
}

impl LinkPlatform for Host {
    fn request_wakeup(&mut self, delta: Tick) {
        self.wakeup = Some(self.clock.get() + delta);
    }

    fn cancel_wakeup(&mut self) {
        self.wakeup = None;
    }

    fn now(&self) -> Tick {
        self.clock.get()
    }

    fn transmit(&mut self, bytes: &[u8]) {
        self.outbox.push(bytes.to_vec());
    }
}

/// Transfer hooks: one wakeup and the final status.
struct Hooks {
    clock: Clock,
    wakeup: Option<Tick>,
    status: Option<TransferStatus>,
}

impl TransferEvents for Hooks {
    fn request_wakeup(&mut self, delta: Tick) {
        self.wakeup = Some(self.clock.get() + delta);
    }

    fn cancel_wakeup(&mut self) {
        self.wakeup = None;
    }

    fn on_status(&mut self, status: TransferStatus) {
        self.status = Some(status);
    }
}

struct Node {
    link: LinkEngine<Host>,
    transfer: FileTransfer<MemoryStorage, Hooks>,
}

impl Node {
    fn new(clock: &Clock, config: TransferConfig, storage: MemoryStorage, seed: u64) -> Self {
        let host = Host {
            clock: clock.clone(),
            wakeup: None,
            outbox: Vec::new(),
        };
        let hooks = Hooks {
            clock: clock.clone(),
            wakeup: None,
            status: None,
        };
        Self {
            link: LinkEngine::new(host, LinkConfig::default()),
            transfer: FileTransfer::new(config, storage, hooks)
                .with_session_ids(SessionIdGenerator::seeded(seed)),
        }
    }

    fn next_wakeup(&self) -> Option<Tick> {
        let link = self.link.platform().wakeup;
        let transfer = self.transfer.events().wakeup;
        link.into_iter().chain(transfer).min()
    }

    fn fire_due(&mut self, now: Tick) {
        if self.link.platform().wakeup.is_some_and(|at| at <= now) {
            self.link.platform_mut().wakeup = None;
            self.link.on_timer_fire(&mut self.transfer);
        }
        if self.transfer.events().wakeup.is_some_and(|at| at <= now) {
            self.transfer.events_mut().wakeup = None;
            self.transfer.on_wakeup(&mut self.link);
        }
    }

    fn status(&self) -> Option<TransferStatus> {
        self.transfer.events().status
    }
}

#[derive(Debug, Default)]
struct Stats {
    frames: u64,
    lost: u64,
    corrupted: u64,
}

/// The simulated line: constant latency, random loss and bit errors.
struct Line {
    rng: StdRng,
    loss: f64,
    corrupt: f64,
    latency: Tick,
    in_flight: VecDeque<(Tick, usize, Vec<u8>)>,
    stats: Stats,
}

impl Line {
    fn offer(&mut self, now: Tick, to: usize, mut bytes: Vec<u8>) {
        self.stats.frames += 1;
        if self.rng.gen_bool(self.loss) {
            self.stats.lost += 1;
            debug!(to, len = bytes.len(), "line: frame lost");
            return;
        }
        if self.rng.gen_bool(self.corrupt) {
            self.stats.corrupted += 1;
            let at = self.rng.gen_range(0..bytes.len());
            bytes[at] ^= 1u8 << self.rng.gen_range(0..8u32);
            debug!(to, at, "line: bit flipped");
        }
        self.in_flight.push_back((now + self.latency, to, bytes));
    }

    fn next_arrival(&self) -> Option<Tick> {
        self.in_flight.front().map(|(at, _, _)| *at)
    }

    fn pop_due(&mut self, now: Tick) -> Option<(usize, Vec<u8>)> {
        match self.in_flight.front() {
            Some((at, _, _)) if *at <= now => {
                self.in_flight.pop_front().map(|(_, to, bytes)| (to, bytes))
            }
            _ => None,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    ensure!((0.0..1.0).contains(&args.loss), "--loss must be in [0, 1)");
    ensure!((0.0..=1.0).contains(&args.corrupt), "--corrupt must be in [0, 1]");

    let seed = args.seed.unwrap_or_else(rand::random);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; args.size as usize];
    rng.fill(&mut data[..]);
    info!(seed, size = args.size, loss = args.loss, corrupt = args.corrupt, "loopback: start");

    let clock = Clock::default();
    let sender_config = TransferConfig::new()
        .with_mtu(args.mtu)
        .with_dt_range(args.dt_min, args.dt_max);
    let mut nodes = [
        Node::new(&clock, sender_config, MemoryStorage::with_source(data.clone()), seed),
        Node::new(&clock, TransferConfig::new(), MemoryStorage::new(), seed ^ 0x5A5A),
    ];
    let mut line = Line {
        rng,
        loss: args.loss,
        corrupt: args.corrupt,
        latency: args.latency,
        in_flight: VecDeque::new(),
        stats: Stats::default(),
    };

    let [sender, _] = &mut nodes;
    sender
        .transfer
        .send_file(&mut sender.link, args.size, "random.bin")
        .context("offering file")?;

    loop {
        let now = clock.get();
        for (from, node) in nodes.iter_mut().enumerate() {
            for bytes in std::mem::take(&mut node.link.platform_mut().outbox) {
                line.offer(now, 1 - from, bytes);
            }
        }
        let sender_aborted = nodes[0].status() == Some(TransferStatus::Aborted);
        if sender_aborted || nodes.iter().all(|node| node.status().is_some()) {
            break;
        }

        let next = nodes
            .iter()
            .filter_map(Node::next_wakeup)
            .chain(line.next_arrival())
            .min();
        let Some(next) = next else {
            bail!("stalled at tick {now} with nothing pending");
        };
        if next > args.limit {
            bail!("no result after {} ticks", args.limit);
        }
        clock.set(next.max(now));

        let now = clock.get();
        while let Some((to, bytes)) = line.pop_due(now) {
            let node = &mut nodes[to];
            node.link.on_bytes(&bytes, &mut node.transfer);
        }
        for node in &mut nodes {
            node.fire_due(now);
        }
    }

    let [sender, receiver] = &nodes;
    let status = sender.status().unwrap_or(TransferStatus::Aborted);
    println!("status        {status:?} / {:?}", receiver.status());
    println!("ticks         {}", clock.get());
    println!(
        "frames        {} sent, {} lost, {} corrupted",
        line.stats.frames, line.stats.lost, line.stats.corrupted
    );
    if let Some(progress) = sender.transfer.progress() {
        println!(
            "acknowledged  {}/{} bytes ({:.0}%)",
            progress.transferred,
            progress.total,
            progress.fraction() * 100.0
        );
    }

    ensure!(status == TransferStatus::Finished, "transfer ended with {status:?}");
    ensure!(
        receiver.transfer.storage().received() == data.as_slice(),
        "received bytes differ from the source"
    );
    println!("verified      {} bytes identical", data.len());
    Ok(())
}
