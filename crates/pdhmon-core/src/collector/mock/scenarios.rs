//! Pre-built mock PDH scenarios for testing.
//!
//! These scenarios mirror what a typical Windows host reports for a few
//! common objects.

use super::pdh::MockPdh;
use crate::collector::transform::{
    PERF_100NSEC_TIMER, PERF_100NSEC_TIMER_INV, PERF_COUNTER_RAWCOUNT, PERF_ELAPSED_TIME,
    PERF_RAW_FRACTION, TICKS_PER_SECOND, WINDOWS_EPOCH,
};

impl MockPdh {
    /// `LogicalDisk` with volumes `C:` and `D:`.
    ///
    /// The `D:` array also carries a `_Total` row, the way wildcard and
    /// aggregate reads do on real hosts.
    pub fn logical_disk() -> Self {
        let pdh = Self::new();
        pdh.add_logical_disk();
        pdh
    }

    /// `System` object: an elapsed-time and a raw-count counter, not instanced.
    pub fn system_uptime() -> Self {
        let pdh = Self::new();
        pdh.add_system();
        pdh
    }

    /// `Processor Information` with two cores and a `_Total` row.
    pub fn processor() -> Self {
        let pdh = Self::new();
        pdh.add_processor();
        pdh
    }

    /// Everything above on one host.
    pub fn typical_system() -> Self {
        let pdh = Self::new();
        pdh.add_logical_disk();
        pdh.add_system();
        pdh.add_processor();
        pdh
    }

    fn add_logical_disk(&self) {
        let free_space = [
            ("C:", 25_000, 100_000),
            ("D:", 60_000, 120_000),
        ];
        for (volume, free, size) in free_space {
            let path = format!("\\LogicalDisk({})\\% Free Space", volume);
            self.define_counter(&path, PERF_RAW_FRACTION, 0);
            self.set_items(&path, vec![Self::item(volume, free, size)]);

            let path = format!("\\LogicalDisk({})\\Free Megabytes", volume);
            self.define_counter(&path, PERF_COUNTER_RAWCOUNT, 0);
            self.set_items(&path, vec![Self::item(volume, free / 10, 0)]);
        }
        self.set_items(
            "\\LogicalDisk(D:)\\% Free Space",
            vec![
                Self::item("D:", 60_000, 120_000),
                Self::item("_Total", 85_000, 220_000),
            ],
        );

        let wildcard = "\\LogicalDisk(*)\\% Free Space";
        self.define_counter(wildcard, PERF_RAW_FRACTION, 0);
        self.set_items(
            wildcard,
            vec![
                Self::item("C:", 25_000, 100_000),
                Self::item("D:", 60_000, 120_000),
                Self::item("HarddiskVolume1", 400, 500),
                Self::item("_Total", 85_400, 220_500),
            ],
        );
    }

    fn add_system(&self) {
        let uptime = "\\System\\System Up Time";
        self.define_counter(uptime, PERF_ELAPSED_TIME, TICKS_PER_SECOND);
        self.set_items(
            uptime,
            vec![Self::item("", WINDOWS_EPOCH + 50_000_000, WINDOWS_EPOCH)],
        );

        let processes = "\\System\\Processes";
        self.define_counter(processes, PERF_COUNTER_RAWCOUNT, 0);
        self.set_items(processes, vec![Self::item("", 245, 0)]);
    }

    fn add_processor(&self) {
        let processor_time = "\\Processor Information(*)\\% Processor Time";
        self.define_counter(processor_time, PERF_100NSEC_TIMER_INV, 0);
        self.set_items(
            processor_time,
            vec![
                Self::item("0,0", 1_200_000_000, 13_300_000_000),
                Self::item("0,1", 1_500_000_000, 13_300_000_000),
                Self::item("0,_Total", 2_700_000_000, 26_600_000_000),
                Self::item("_Total", 2_700_000_000, 26_600_000_000),
            ],
        );

        let privileged = "\\Processor Information(*)\\% Privileged Time";
        self.define_counter(privileged, PERF_100NSEC_TIMER, 0);
        self.set_items(
            privileged,
            vec![
                Self::item("0,0", 300_000_000, 13_300_000_000),
                Self::item("0,1", 450_000_000, 13_300_000_000),
                Self::item("_Total", 750_000_000, 26_600_000_000),
            ],
        );
    }
}
