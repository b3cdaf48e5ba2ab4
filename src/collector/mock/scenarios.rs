//! Pre-built `/proc` fixtures.

use super::filesystem::MockFs;

const TYPICAL_STAT: &str = "4242 (memtrace) S 1 4242 4242 0 -1 4194304 1200 0 3 0 250 50 0 0 20 0 6 0 81234 104857600 5120 18446744073709551615 0 0 0 0 0 0 0 4096 17920 0 0 0 17 3 0 0 0 0 0\n";

const TYPICAL_IO: &str = "\
rchar: 524288
wchar: 131072
syscr: 100
syscw: 50
read_bytes: 4096
write_bytes: 8192
cancelled_write_bytes: 0
";

const TYPICAL_SMAPS: &str = "\
55d4c0a00000-55d4c0a21000 rw-p 00000000 00:00 0                          [heap]
Size:                132 kB
Rss:                 100 kB
Pss:                  90 kB
Shared_Clean:          0 kB
Shared_Dirty:          4 kB
Private_Clean:         0 kB
Private_Dirty:        80 kB
VmFlags: rd wr mr mw me ac sd
7f1c2a000000-7f1c2a400000 rw-p 00000000 00:00 0
Size:               4096 kB
Rss:                2048 kB
Pss:                2048 kB
Shared_Dirty:          0 kB
Private_Dirty:      2000 kB
7f1c2b000000-7f1c2b200000 r-xp 00000000 08:01 1234                       /usr/lib/libc.so.6
Size:               2048 kB
Rss:                 512 kB
Pss:                 100 kB
Shared_Dirty:          0 kB
Private_Dirty:         8 kB
7ffd1c000000-7ffd1c021000 rw-p 00000000 00:00 0                          [stack]
Size:                132 kB
Rss:                  20 kB
Pss:                  20 kB
Shared_Dirty:          0 kB
Private_Dirty:        20 kB
";

impl MockFs {
    /// A single traced process with a small brk heap, one anonymous arena,
    /// libc and a stack.
    pub fn typical_process() -> Self {
        let mut fs = MockFs::new();
        fs.add_file("/proc/uptime", "350735.47 234388.90\n");
        fs.add_self_process(TYPICAL_STAT, TYPICAL_IO, TYPICAL_SMAPS);
        fs
    }
}
