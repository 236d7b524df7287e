use getopts::Options;
use hdrhistogram::Histogram as HdrHistogram;
use log::{error, info};
use metrics_families::{
    Counter, CounterFamily, CounterOptions, DumpFormat, DumpOptions, Gauge, GaugeFamily,
    GaugeOptions, Registry, Summary, SummaryFamily, SummaryOptions,
};
use quanta::{Clock, Instant as QuantaInstant};
use std::{
    env, io,
    ops::Sub,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

const LOOP_SAMPLE: u64 = 1000;

/// The families every producer records into.
#[derive(Clone)]
struct Families {
    requests: Arc<CounterFamily>,
    total: Arc<GaugeFamily>,
    latency: Arc<SummaryFamily>,
    slots: Arc<Vec<String>>,
}

impl Families {
    fn new(registry: &Registry, cardinality: usize) -> Families {
        let requests = CounterFamily::new_in(
            registry,
            CounterOptions::new("requests", "Loop iterations.")
                .namespace("bench")
                .dimensions(["slot"]),
        );
        let total = GaugeFamily::new_in(
            registry,
            GaugeOptions::new("total", "Iterations of the last sampled producer.")
                .namespace("bench"),
        );
        let latency = SummaryFamily::new_in(
            registry,
            SummaryOptions::new("loop_seconds", "Time between loop iterations.")
                .namespace("bench")
                .dimensions(["slot"]),
        );
        let slots = Arc::new((0..cardinality.max(1)).map(|i| format!("slot-{}", i)).collect());

        Families { requests, total, latency, slots }
    }
}

struct Generator {
    t0: Option<QuantaInstant>,
    gauge: i64,
    hist: HdrHistogram<u64>,
    families: Families,
    done: Arc<AtomicBool>,
    rate_counter: Arc<AtomicU64>,
}

impl Generator {
    fn new(families: Families, done: Arc<AtomicBool>, rate_counter: Arc<AtomicU64>) -> Generator {
        Generator {
            t0: None,
            gauge: 0,
            hist: HdrHistogram::<u64>::new_with_bounds(1, u64::MAX, 3).unwrap(),
            families,
            done,
            rate_counter,
        }
    }

    /// Resolves every instance through a partial on each iteration.
    fn run_slow(&mut self) {
        let clock = Clock::new();
        let slots = Arc::clone(&self.families.slots);
        let mut loop_counter = 0;

        loop {
            loop_counter += 1;

            self.gauge += 1;

            let t1 = clock.recent();

            if let Some(t0) = self.t0 {
                let start = if loop_counter % LOOP_SAMPLE == 0 { Some(clock.now()) } else { None };
                let slot = slots[(loop_counter % slots.len() as u64) as usize].as_str();

                self.families.requests.new_child(&["slot", slot]).apply().increment();
                self.families.total.new_child::<&str>(&[]).apply().set(self.gauge as f64);
                self.families
                    .latency
                    .new_child(&["slot", slot])
                    .apply()
                    .sample(t1.sub(t0).as_secs_f64());

                if let Some(val) = start {
                    let delta = clock.now() - val;
                    self.hist.saturating_record(delta.as_nanos() as u64);

                    // We also increment our global counter for the sample rate here.
                    self.rate_counter.fetch_add(LOOP_SAMPLE * 3, Ordering::AcqRel);

                    if self.done.load(Ordering::Relaxed) {
                        break;
                    }
                }
            }

            self.t0 = Some(t1);
        }
    }

    /// Resolves every instance once up front and only updates values in the loop.
    fn run_fast(&mut self) {
        let clock = Clock::new();
        let mut loop_counter = 0;

        let counters: Vec<Arc<Counter>> = self
            .families
            .slots
            .iter()
            .map(|slot| self.families.requests.new_child(&["slot", slot.as_str()]).apply())
            .collect();
        let gauge: Arc<Gauge> = self.families.total.new_child::<&str>(&[]).apply();
        let summaries: Vec<Arc<Summary>> = self
            .families
            .slots
            .iter()
            .map(|slot| self.families.latency.new_child(&["slot", slot.as_str()]).apply())
            .collect();

        loop {
            loop_counter += 1;

            self.gauge += 1;

            let t1 = clock.recent();

            if let Some(t0) = self.t0 {
                let start = if loop_counter % LOOP_SAMPLE == 0 { Some(clock.now()) } else { None };
                let slot = (loop_counter % counters.len() as u64) as usize;

                counters[slot].increment();
                gauge.set(self.gauge as f64);
                summaries[slot].sample(t1.sub(t0).as_secs_f64());

                if let Some(val) = start {
                    let delta = clock.now() - val;
                    self.hist.saturating_record(delta.as_nanos() as u64);

                    // We also increment our global counter for the sample rate here.
                    self.rate_counter.fetch_add(LOOP_SAMPLE * 3, Ordering::AcqRel);

                    if self.done.load(Ordering::Relaxed) {
                        break;
                    }
                }
            }

            self.t0 = Some(t1);
        }
    }
}

impl Drop for Generator {
    fn drop(&mut self) {
        info!(
            "    sender latency: min: {:8} p50: {:8} p95: {:8} p99: {:8} p999: {:8} max: {:8}",
            nanos_to_readable(self.hist.min()),
            nanos_to_readable(self.hist.value_at_percentile(50.0)),
            nanos_to_readable(self.hist.value_at_percentile(95.0)),
            nanos_to_readable(self.hist.value_at_percentile(99.0)),
            nanos_to_readable(self.hist.value_at_percentile(99.9)),
            nanos_to_readable(self.hist.max())
        );
    }
}

/// Counts the bytes written by a dump and throws them away.
#[derive(Default)]
struct CountingSink {
    written: u64,
}

impl io::Write for CountingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn print_usage(program: &str, opts: &Options) {
    let brief = format!("Usage: {} [options]", program);
    print!("{}", opts.usage(&brief));
}

pub fn opts() -> Options {
    let mut opts = Options::new();

    opts.optopt("d", "duration", "number of seconds to run the benchmark", "INTEGER");
    opts.optopt(
        "m",
        "mode",
        "whether or run the benchmark in slow or fast mode (partials vs resolved instances)",
        "STRING",
    );
    opts.optopt("p", "producers", "number of producers", "INTEGER");
    opts.optopt("c", "cardinality", "number of distinct label values per family", "INTEGER");
    opts.optopt("f", "format", "dump format: protobuf, text or json", "STRING");
    opts.optflag("h", "help", "print this help menu");

    opts
}

fn parse_format(s: &str) -> Option<DumpFormat> {
    match s.to_ascii_lowercase().as_str() {
        "protobuf" | "proto" => Some(DumpFormat::Protobuf),
        "text" => Some(DumpFormat::Text),
        "json" => Some(DumpFormat::Json),
        _ => None,
    }
}

fn parse_count(matches: &getopts::Matches, name: &str, default: usize) -> Option<usize> {
    match matches.opt_str(name) {
        Some(s) => match s.parse() {
            Ok(n) => Some(n),
            Err(e) => {
                error!("Invalid value for --{}: {} ({})", name, s, e);
                None
            }
        },
        None => Some(default),
    }
}

fn main() {
    pretty_env_logger::init();

    let args: Vec<String> = env::args().collect();
    let program = &args[0];
    let opts = opts();

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(f) => {
            error!("Failed to parse command line args: {}", f);
            return;
        }
    };

    if matches.opt_present("help") {
        print_usage(program, &opts);
        return;
    }

    info!("metrics families benchmark");

    let (seconds, producers, cardinality) = match (
        parse_count(&matches, "duration", 60),
        parse_count(&matches, "producers", 1),
        parse_count(&matches, "cardinality", 16),
    ) {
        (Some(seconds), Some(producers), Some(cardinality)) => (seconds, producers, cardinality),
        _ => return,
    };
    let mode = matches
        .opt_str("mode")
        .map(|s| if s.to_ascii_lowercase() == "fast" { "fast" } else { "slow" })
        .unwrap_or("slow")
        .to_owned();
    let format = match matches.opt_str("format") {
        Some(s) => match parse_format(&s) {
            Some(format) => format,
            None => {
                error!("Unknown dump format: {}", s);
                return;
            }
        },
        None => DumpFormat::default(),
    };

    info!("duration: {}s", seconds);
    info!("producers: {}", producers);
    info!("cardinality: {}", cardinality);
    info!("dump format: {:?}", format);

    let registry = Registry::new();
    let families = Families::new(&registry, cardinality);
    let dump_options = DumpOptions::new().format(format).include_help(true);

    info!("families registered");

    // Spin up our sample producers.
    let done = Arc::new(AtomicBool::new(false));
    let rate_counter = Arc::new(AtomicU64::new(0));
    let mut handles = Vec::new();

    for _ in 0..producers {
        let f = families.clone();
        let d = done.clone();
        let r = rate_counter.clone();
        let mode = mode.clone();
        let handle = thread::spawn(move || {
            let mut gen = Generator::new(f, d, r);
            if mode == "fast" {
                gen.run_fast();
            } else {
                gen.run_slow();
            }
        });

        handles.push(handle);
    }

    thread::spawn(|| loop {
        thread::sleep(Duration::from_millis(10));
        quanta::set_recent(quanta::Instant::now());
    });

    // Dump the registry once per turn, and figure out the sample rate.
    let mut total = 0;
    let mut t0 = Instant::now();
    let mut dumped = 0;

    let mut dump_hist = HdrHistogram::<u64>::new_with_bounds(1, u64::MAX, 3).unwrap();
    for _ in 0..seconds {
        let t1 = Instant::now();

        let mut sink = CountingSink::default();
        let start = Instant::now();
        if let Err(e) = registry.dump(&mut sink, &dump_options) {
            error!("Failed to dump registry: {}", e);
        }
        let end = Instant::now();
        dump_hist.saturating_record(duration_as_nanos(end - start) as u64);
        dumped += sink.written;

        let turn_total = rate_counter.load(Ordering::Acquire);
        let turn_delta = turn_total - total;
        total = turn_total;
        let rate = turn_delta as f64 / (duration_as_nanos(t1 - t0) / 1_000_000_000.0);

        info!("sample ingest rate: {:.0} samples/sec", rate);
        t0 = t1;
        thread::sleep(Duration::new(1, 0));
    }

    info!("--------------------------------------------------------------------------------");
    info!(" ingested samples total: {}", total);
    info!("     dumped bytes total: {}", dumped);
    info!(
        "     registry dump: min: {:8} p50: {:8} p95: {:8} p99: {:8} p999: {:8} max: {:8}",
        nanos_to_readable(dump_hist.min()),
        nanos_to_readable(dump_hist.value_at_percentile(50.0)),
        nanos_to_readable(dump_hist.value_at_percentile(95.0)),
        nanos_to_readable(dump_hist.value_at_percentile(99.0)),
        nanos_to_readable(dump_hist.value_at_percentile(99.9)),
        nanos_to_readable(dump_hist.max())
    );

    // Wait for the producers to finish so we can get their stats too.
    done.store(true, Ordering::SeqCst);
    for handle in handles {
        let _ = handle.join();
    }
}

fn duration_as_nanos(d: Duration) -> f64 {
    (d.as_secs() as f64 * 1e9) + d.subsec_nanos() as f64
}

fn nanos_to_readable(t: u64) -> String {
    let f = t as f64;
    if f < 1_000.0 {
        format!("{}ns", f)
    } else if f < 1_000_000.0 {
        format!("{:.0}μs", f / 1_000.0)
    } else if f < 2_000_000_000.0 {
        format!("{:.2}ms", f / 1_000_000.0)
    } else {
        format!("{:.3}s", f / 1_000_000_000.0)
    }
}
