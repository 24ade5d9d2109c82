//! Field-position tables for fixed-order procfs records.
//!
//! A [`Schema`] names the whitespace-separated tokens of one record line. The
//! position of a field is its index in the table, so positions are always
//! contiguous from 0. Tables are process-wide statics shared by every parse.

/// Nominal type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Coerced to a number when the token looks numeric.
    Numeric,
    /// Always kept as text.
    Text,
}

/// One named position in a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl Field {
    pub const fn num(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Numeric,
        }
    }

    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Text,
        }
    }
}

/// Declarative description of a fixed-order textual record.
#[derive(Debug)]
pub struct Schema {
    name: &'static str,
    fields: &'static [Field],
}

impl Schema {
    pub const fn new(name: &'static str, fields: &'static [Field]) -> Self {
        Self { name, fields }
    }

    /// Short name of the record kind, used in diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of fields a well-formed record has.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &'static [Field] {
        self.fields
    }

    /// Returns the position of `name`.
    ///
    /// # Panics
    /// Panics if the schema has no such field. Field names are compile-time
    /// constants, so an unknown name is a bug in the caller.
    pub fn field_index(&self, name: &str) -> usize {
        self.fields
            .iter()
            .position(|f| f.name == name)
            .unwrap_or_else(|| panic!("schema '{}' has no field '{}'", self.name, name))
    }
}

/// `/proc/[pid]/stat`, 52 fields as documented for Linux 3.5+.
pub static PROC_STAT: Schema = Schema::new(
    "stat",
    &[
        Field::num("pid"),
        Field::text("comm"),
        Field::text("state"),
        Field::num("ppid"),
        Field::num("pgrp"),
        Field::num("session"),
        Field::num("tty_nr"),
        Field::num("tpgid"),
        Field::num("flags"),
        Field::num("minflt"),
        Field::num("cminflt"),
        Field::num("majflt"),
        Field::num("cmajflt"),
        Field::num("utime"),
        Field::num("stime"),
        Field::num("cutime"),
        Field::num("cstime"),
        Field::num("priority"),
        Field::num("nice"),
        Field::num("num_threads"),
        Field::num("itrealvalue"),
        Field::num("starttime"),
        Field::num("vsize"),
        Field::num("rss"),
        Field::num("rsslim"),
        Field::num("startcode"),
        Field::num("endcode"),
        Field::num("startstack"),
        Field::num("kstkesp"),
        Field::num("kstkeip"),
        Field::num("signal"),
        Field::num("blocked"),
        Field::num("sigignore"),
        Field::num("sigcatch"),
        Field::num("wchan"),
        Field::num("nswap"),
        Field::num("cnswap"),
        Field::num("exit_signal"),
        Field::num("processor"),
        Field::num("rt_priority"),
        Field::num("policy"),
        Field::num("delayacct_blkio_ticks"),
        Field::num("guest_time"),
        Field::num("cguest_time"),
        Field::num("start_data"),
        Field::num("end_data"),
        Field::num("start_brk"),
        Field::num("arg_start"),
        Field::num("arg_end"),
        Field::num("env_start"),
        Field::num("env_end"),
        Field::num("exit_code"),
    ],
);

/// One interface line of `/proc/net/dev`, name first.
pub static NET_DEV: Schema = Schema::new(
    "net/dev",
    &[
        Field::text("name"),
        Field::num("rx_bytes"),
        Field::num("rx_packets"),
        Field::num("rx_errs"),
        Field::num("rx_drop"),
        Field::num("rx_fifo"),
        Field::num("rx_frame"),
        Field::num("rx_compressed"),
        Field::num("rx_multicast"),
        Field::num("tx_bytes"),
        Field::num("tx_packets"),
        Field::num("tx_errs"),
        Field::num("tx_drop"),
        Field::num("tx_fifo"),
        Field::num("tx_colls"),
        Field::num("tx_carrier"),
        Field::num("tx_compressed"),
    ],
);

/// One `cpu`/`cpuN` line of `/proc/stat`. Counters are in clock ticks.
pub static CPU_STAT: Schema = Schema::new(
    "stat/cpu",
    &[
        Field::text("cpu"),
        Field::num("user"),
        Field::num("nice"),
        Field::num("system"),
        Field::num("idle"),
        Field::num("iowait"),
        Field::num("irq"),
        Field::num("softirq"),
        Field::num("steal"),
        Field::num("guest"),
        Field::num("guest_nice"),
    ],
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_proc_stat_layout() {
        assert_eq!(PROC_STAT.field_count(), 52);
        assert_eq!(PROC_STAT.field_index("pid"), 0);
        assert_eq!(PROC_STAT.field_index("comm"), 1);
        assert_eq!(PROC_STAT.field_index("state"), 2);
        assert_eq!(PROC_STAT.field_index("utime"), 13);
        assert_eq!(PROC_STAT.field_index("cstime"), 16);
        assert_eq!(PROC_STAT.field_index("rss"), 23);
        assert_eq!(PROC_STAT.field_index("exit_code"), 51);
    }

    #[test]
    fn test_field_names_unique() {
        for schema in [&PROC_STAT, &NET_DEV, &CPU_STAT] {
            let names: HashSet<_> = schema.fields().iter().map(|f| f.name).collect();
            assert_eq!(names.len(), schema.field_count(), "{}", schema.name());
        }
    }

    #[test]
    fn test_net_dev_layout() {
        assert_eq!(NET_DEV.field_count(), 17);
        assert_eq!(NET_DEV.field_index("rx_bytes"), 1);
        assert_eq!(NET_DEV.field_index("tx_bytes"), 9);
        assert_eq!(CPU_STAT.field_index("idle"), 4);
    }

    #[test]
    #[should_panic(expected = "has no field 'uptime'")]
    fn test_unknown_field_panics() {
        PROC_STAT.field_index("uptime");
    }
}
