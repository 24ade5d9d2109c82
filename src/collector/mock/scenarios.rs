//! Pre-built mock filesystem scenarios for testing.
//!
//! `typical_system()` and `typical_system_later()` form a pair: the second is
//! the same host two seconds of uptime later, with counters advanced, one
//! process exited, one process spawned and one new interface.

use super::filesystem::MockFs;

const NET_DEV_HEADER: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
";

impl MockFs {
    /// Renders a 52-field `/proc/[pid]/stat` line.
    ///
    /// `cpu` is `[utime, stime, cutime, cstime]` in clock ticks, `rss` in pages.
    pub fn stat_line(pid: u32, comm: &str, state: char, ppid: u32, cpu: [i64; 4], rss: u64) -> String {
        let [utime, stime, cutime, cstime] = cpu;
        format!(
            "{pid} ({comm}) {state} {ppid} {pid} {pid} 0 -1 4194304 1500 0 12 0 \
             {utime} {stime} {cutime} {cstime} 20 0 1 0 {start} {vsize} {rss} \
             18446744073709551615 1 1 0 0 0 0 0 4096 0 0 0 0 17 0 0 0 0 0 0 0 0 0 0 0 0 0 0",
            start = u64::from(pid) * 100,
            vsize = rss * 4096 * 4,
        )
    }

    /// Creates a typical system with a few processes, interfaces and two cores.
    ///
    /// Processes: init (1), bash (1000), postgres (1001), a short-lived job (1500).
    /// Interfaces: `lo` (virtual), `eth0` (physical), `docker0` (bridge),
    /// `veth9a` (bridge port).
    pub fn typical_system() -> Self {
        let mut fs = Self::new();
        fs.add_file("/proc/uptime", "12345.67 98765.43\n");
        fs.add_file(
            "/proc/stat",
            "\
cpu  10000 500 3000 80000 1000 200 100 0 0 0
cpu0 5000 250 1500 40000 500 100 50 0 0 0
cpu1 5000 250 1500 40000 500 100 50 0 0 0
intr 1000000 50 0 0 0 0 0 0 0 1 0 0 0 100 0 0 1000
ctxt 500000
btime 1700000000
processes 10000
procs_running 2
procs_blocked 0
",
        );
        fs.add_file(
            "/proc/net/dev",
            format!(
                "{NET_DEV_HEADER}\
    lo: 12345678     9876    0    0    0     0          0         0 12345678     9876    0    0    0     0       0          0
  eth0: 987654321   654321    5   10    0     0          0       100 123456789   456789    2    5    0     0       0          0
docker0:    10000      100    0    0    0     0          0         0    20000      200    0    0    0     0       0          0
veth9a:     5000       50    0    0    0     0          0         0     6000       60    0    0    0     0       0          0
"
            ),
        );
        add_net_topology(&mut fs);

        fs.add_process(
            1,
            &Self::stat_line(1, "systemd", 'S', 0, [100, 50, 2000, 800], 3000),
            "/sbin/init\0splash\0",
        );
        fs.add_process(
            1000,
            &Self::stat_line(1000, "bash", 'S', 1, [500, 200, 0, 0], 2000),
            "-bash\0",
        );
        fs.add_process(
            1001,
            &Self::stat_line(1001, "postgres", 'R', 1, [10000, 2000, 0, 0], 25600),
            "/usr/lib/postgresql/16/bin/postgres\0-D\0/var/lib/postgresql/16/main\0",
        );
        fs.add_process(
            1500,
            &Self::stat_line(1500, "logrotate", 'D', 1, [5, 5, 0, 0], 300),
            "/usr/sbin/logrotate\0/etc/logrotate.conf\0",
        );
        fs
    }

    /// The `typical_system()` host two seconds later.
    ///
    /// - bash (1000): +20 user ticks, +10 system ticks
    /// - postgres (1001): +300 user ticks, +100 system ticks (more than one core)
    /// - logrotate (1500) exited, psql (1002) spawned
    /// - eth0: +4096 rx bytes, +2048 tx bytes; `tun0` appeared
    /// - cpu0: +50 user, +25 system, +25 idle; cpu1: +100 idle
    pub fn typical_system_later() -> Self {
        let mut fs = Self::new();
        fs.add_file("/proc/uptime", "12347.67 98768.93\n");
        fs.add_file(
            "/proc/stat",
            "\
cpu  10050 500 3025 80125 1000 200 100 0 0 0
cpu0 5050 250 1525 40025 500 100 50 0 0 0
cpu1 5000 250 1500 40100 500 100 50 0 0 0
intr 1000500 50 0 0 0 0 0 0 0 1 0 0 0 100 0 0 1000
ctxt 500900
btime 1700000000
processes 10001
procs_running 3
procs_blocked 0
",
        );
        fs.add_file(
            "/proc/net/dev",
            format!(
                "{NET_DEV_HEADER}\
    lo: 12345678     9876    0    0    0     0          0         0 12345678     9876    0    0    0     0       0          0
  eth0: 987658417   654330    5   10    0     0          0       100 123458837   456795    2    5    0     0       0          0
docker0:    11024      110    0    0    0     0          0         0    20000      200    0    0    0     0       0          0
veth9a:     6024       60    0    0    0     0          0         0     7024       70    0    0    0     0       0          0
  tun0:      512        4    0    0    0     0          0         0      512        4    0    0    0     0       0          0
"
            ),
        );
        add_net_topology(&mut fs);
        fs.add_net_marker("tun0", "tun_flags");
        fs.add_virtual_net("tun0");

        fs.add_process(
            1,
            &Self::stat_line(1, "systemd", 'S', 0, [100, 50, 2000, 800], 3000),
            "/sbin/init\0splash\0",
        );
        fs.add_process(
            1000,
            &Self::stat_line(1000, "bash", 'S', 1, [520, 210, 0, 0], 2000),
            "-bash\0",
        );
        fs.add_process(
            1001,
            &Self::stat_line(1001, "postgres", 'R', 1, [10300, 2100, 0, 0], 25600),
            "/usr/lib/postgresql/16/bin/postgres\0-D\0/var/lib/postgresql/16/main\0",
        );
        fs.add_process(
            1002,
            &Self::stat_line(1002, "psql", 'S', 1000, [3, 1, 0, 0], 1500),
            "psql\0-U\0postgres\0",
        );
        fs
    }

    /// Creates a system with processes whose names contain spaces and parentheses.
    pub fn with_special_names() -> Self {
        let mut fs = Self::new();
        fs.add_file("/proc/uptime", "500.00 1800.00\n");
        fs.add_process(
            5000,
            &Self::stat_line(5000, "Web Content", 'S', 4999, [5000, 1000, 0, 0], 50000),
            "/usr/lib/firefox/firefox\0-contentproc\0",
        );
        fs.add_process(
            5001,
            &Self::stat_line(5001, "test(1)", 'S', 1, [10, 5, 0, 0], 1000),
            "",
        );
        fs.add_process(
            5002,
            &Self::stat_line(5002, ") S 1 (", 'S', 1, [1, 1, 0, 0], 100),
            "./weird\0",
        );
        fs
    }

    /// Creates a system with a zombie process.
    pub fn with_zombie_process() -> Self {
        let mut fs = Self::new();
        fs.add_file("/proc/uptime", "4000.00 15000.00\n");
        fs.add_process(
            4000,
            &Self::stat_line(4000, "defunct", 'Z', 1000, [0, 0, 0, 0], 0),
            "",
        );
        fs
    }

    /// Creates a system with one healthy process, one that vanished between
    /// listing and reading, and one with a corrupt stat record.
    pub fn with_unreliable_processes() -> Self {
        let mut fs = Self::new();
        fs.add_file("/proc/uptime", "900.00 3000.00\n");
        fs.add_process(
            1,
            &Self::stat_line(1, "systemd", 'S', 0, [100, 50, 0, 0], 3000),
            "/sbin/init\0",
        );
        fs.add_dir("/proc/6000");
        fs.add_file("/proc/6000/cmdline", "sleep\x000.1\0");
        fs.add_process(6100, "6100 corrupted S 1 6100 6100", "");
        fs.add_file("/proc/self/stat", "not a pid directory");
        fs
    }
}

fn add_net_topology(fs: &mut MockFs) {
    fs.add_virtual_net("lo");
    fs.add_net_marker("docker0", "bridge");
    fs.add_virtual_net("docker0");
    fs.add_net_marker("veth9a", "brport");
    fs.add_virtual_net("veth9a");
    fs.add_dir("/sys/class/net/eth0/device");
}
