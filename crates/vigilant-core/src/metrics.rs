//! Host metric samples and the bounded time-series buffer behind live charts.

use std::collections::VecDeque;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Default number of samples kept for display.
pub const DEFAULT_METRICS_CAPACITY: usize = 30;

/// Memory usage as reported by `GET /metrics/current`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryUsage {
    pub percent: f64,
    /// Total memory in GiB.
    pub total: f64,
}

/// Disk usage of the root filesystem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskUsage {
    pub percent: f64,
    /// Total capacity in GiB.
    pub total: f64,
}

/// Cumulative network counters, in MiB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkUsage {
    pub bytes_sent: f64,
    pub bytes_recv: f64,
}

/// Body of `GET /metrics/current`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSnapshot {
    /// CPU usage percentage.
    pub cpu: f64,
    pub memory: MemoryUsage,
    pub disk: DiskUsage,
    pub network: NetworkUsage,
}

impl MetricsSnapshot {
    /// Overall health, 0 to 100: `100 - (cpu*0.4 + memory*0.4 + disk*0.2)`.
    pub fn health_score(&self) -> f64 {
        (100.0 - (self.cpu * 0.4 + self.memory.percent * 0.4 + self.disk.percent * 0.2)).max(0.0)
    }
}

/// One point of the CPU/memory time series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub timestamp: DateTime<Local>,
}

impl MetricSample {
    /// Create a sample stamped with the current time.
    pub fn now(cpu_percent: f64, memory_percent: f64) -> Self {
        Self {
            cpu_percent,
            memory_percent,
            timestamp: Local::now(),
        }
    }

    /// Take the CPU and memory readings from a server snapshot.
    pub fn from_snapshot(snapshot: &MetricsSnapshot) -> Self {
        Self::now(snapshot.cpu, snapshot.memory.percent)
    }
}

/// Average and peak values over the buffered window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsStats {
    pub avg_cpu: f64,
    pub peak_cpu: f64,
    pub avg_memory: f64,
    pub peak_memory: f64,
    pub current: MetricSample,
}

/// Fixed-capacity FIFO of metric samples.
///
/// CPU, memory and timestamps are stored as parallel series so charts can
/// bind to them directly; the three series always have the same length.
#[derive(Debug, Clone)]
pub struct MetricsBuffer {
    cpu: VecDeque<f64>,
    memory: VecDeque<f64>,
    timestamps: VecDeque<DateTime<Local>>,
    capacity: usize,
}

impl Default for MetricsBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_METRICS_CAPACITY)
    }
}

impl MetricsBuffer {
    /// Create a buffer holding at most `capacity` samples (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            cpu: VecDeque::with_capacity(capacity + 1),
            memory: VecDeque::with_capacity(capacity + 1),
            timestamps: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest once over capacity.
    pub fn push(&mut self, sample: MetricSample) {
        self.cpu.push_back(sample.cpu_percent);
        self.memory.push_back(sample.memory_percent);
        self.timestamps.push_back(sample.timestamp);

        while self.cpu.len() > self.capacity {
            self.cpu.pop_front();
            self.memory.pop_front();
            self.timestamps.pop_front();
        }
    }

    /// Samples currently held, oldest first.
    pub fn window(&self) -> Vec<MetricSample> {
        self.cpu
            .iter()
            .zip(&self.memory)
            .zip(&self.timestamps)
            .map(|((&cpu_percent, &memory_percent), &timestamp)| MetricSample {
                cpu_percent,
                memory_percent,
                timestamp,
            })
            .collect()
    }

    pub fn cpu_series(&self) -> &VecDeque<f64> {
        &self.cpu
    }

    pub fn memory_series(&self) -> &VecDeque<f64> {
        &self.memory
    }

    pub fn timestamps(&self) -> &VecDeque<DateTime<Local>> {
        &self.timestamps
    }

    /// Most recent sample.
    pub fn latest(&self) -> Option<MetricSample> {
        Some(MetricSample {
            cpu_percent: *self.cpu.back()?,
            memory_percent: *self.memory.back()?,
            timestamp: *self.timestamps.back()?,
        })
    }

    pub fn len(&self) -> usize {
        self.cpu.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cpu.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.cpu.clear();
        self.memory.clear();
        self.timestamps.clear();
    }

    /// Averages and peaks over the window, or `None` when empty.
    pub fn stats(&self) -> Option<MetricsStats> {
        let current = self.latest()?;
        let n = self.len() as f64;
        Some(MetricsStats {
            avg_cpu: self.cpu.iter().sum::<f64>() / n,
            peak_cpu: self.cpu.iter().copied().fold(f64::MIN, f64::max),
            avg_memory: self.memory.iter().sum::<f64>() / n,
            peak_memory: self.memory.iter().copied().fold(f64::MIN, f64::max),
            current,
        })
    }
}
