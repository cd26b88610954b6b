//! Pre-built mock filesystem scenarios for testing.
//!
//! These scenarios provide realistic `/sys` and `/proc` states as found on
//! common desktop and laptop machines.

use super::filesystem::MockFs;

impl MockFs {
    /// A Ryzen desktop with a discrete AMD GPU, two NVMe drives, DDR5 with
    /// SPD sensors and an AIO liquid cooler.
    ///
    /// Includes a few values a real machine produces that are not physically
    /// meaningful: a 255 °C memory junction on the GPU and an unconnected
    /// Super-I/O input reading 127 °C.
    pub fn typical_desktop() -> Self {
        let fs = Self::new();

        fs.add_file(
            "/proc/cpuinfo",
            "\
processor\t: 0
vendor_id\t: AuthenticAMD
cpu family\t: 25
model\t\t: 97
model name\t: AMD Ryzen 9 7950X 16-Core Processor
cpu MHz\t\t: 4500.000
",
        );
        fs.add_file(
            "/proc/stat",
            "\
cpu  100 0 100 700 100 0 0 0 0 0
cpu0 50 0 50 350 50 0 0 0 0 0
cpu1 50 0 50 350 50 0 0 0 0 0
ctxt 500000
btime 1700000000
",
        );
        fs.add_file("/sys/class/powercap/intel-rapl:0/name", "package-0\n");
        fs.add_file("/sys/class/powercap/intel-rapl:0/energy_uj", "1000000\n");
        fs.add_file(
            "/sys/class/powercap/intel-rapl:0/max_energy_range_uj",
            "65532610987\n",
        );
        fs.add_file("/sys/class/dmi/id/board_vendor", "ASUSTeK\n");
        fs.add_file("/sys/class/dmi/id/board_name", "ROG STRIX X670E-E\n");

        // ACPI thermal zone
        fs.add_hwmon_chip("/sys", 0, "acpitz", &[("temp1_input", "27800")]);

        fs.add_hwmon_chip(
            "/sys",
            1,
            "k10temp",
            &[
                ("temp1_label", "Tctl"),
                ("temp1_input", "62500"),
                ("temp3_label", "Tccd1"),
                ("temp3_input", "58250"),
                ("temp4_label", "Tccd2"),
                ("temp4_input", "55000"),
            ],
        );

        let gpu = fs.add_hwmon_chip(
            "/sys",
            2,
            "amdgpu",
            &[
                ("temp1_label", "edge"),
                ("temp1_input", "52000"),
                ("temp2_label", "junction"),
                ("temp2_input", "71000"),
                ("temp3_label", "mem"),
                ("temp3_input", "255000"),
                ("power1_label", "PPT"),
                ("power1_average", "187000000"),
                ("power1_input", "192000000"),
                ("fan1_input", "1450"),
            ],
        );
        fs.add_file(gpu.join("device/gpu_busy_percent"), "64\n");

        let nvme0 = fs.add_hwmon_chip(
            "/sys",
            3,
            "nvme",
            &[
                ("temp1_label", "Composite"),
                ("temp1_input", "41850"),
                ("temp2_label", "Sensor 1"),
                ("temp2_input", "41850"),
                ("temp3_label", "Sensor 2"),
                ("temp3_input", "47850"),
            ],
        );
        fs.add_file(nvme0.join("device/model"), "Samsung SSD 990 PRO 2TB\n");

        let nvme1 = fs.add_hwmon_chip(
            "/sys",
            4,
            "nvme",
            &[
                ("temp1_label", "Composite"),
                ("temp1_input", "36850"),
                ("temp2_label", "Sensor 1"),
                ("temp2_input", "36850"),
                ("temp3_label", "Sensor 2"),
                ("temp3_input", "44850"),
            ],
        );
        fs.add_file(nvme1.join("device/model"), "WD_BLACK SN850X 1TB\n");

        fs.add_hwmon_chip(
            "/sys",
            5,
            "nct6799",
            &[
                ("temp1_label", "SYSTIN"),
                ("temp1_input", "34000"),
                ("temp2_label", "CPUTIN"),
                ("temp2_input", "45500"),
                ("temp3_input", "127000"),
                ("fan1_input", "820"),
                ("fan2_input", "1100"),
            ],
        );

        fs.add_hwmon_chip("/sys", 6, "spd5118", &[("temp1_input", "38250")]);
        fs.add_hwmon_chip("/sys", 7, "spd5118", &[("temp1_input", "39500")]);

        fs.add_hwmon_chip(
            "/sys",
            8,
            "kraken3",
            &[
                ("temp1_label", "Coolant temp"),
                ("temp1_input", "31200"),
                ("fan1_label", "Pump speed"),
                ("fan1_input", "2400"),
                ("fan2_label", "Fan speed"),
                ("fan2_input", "1100"),
            ],
        );

        fs
    }

    /// An Intel laptop: coretemp, a ThinkPad EC with one fan, a single NVMe
    /// drive and no discrete GPU, memory sensors or liquid cooling.
    ///
    /// The battery chip is not classified and must be ignored.
    pub fn laptop() -> Self {
        let fs = Self::new();

        fs.add_file(
            "/proc/cpuinfo",
            "\
processor\t: 0
vendor_id\t: GenuineIntel
model name\t: 13th Gen Intel(R) Core(TM) i7-1365U
",
        );
        fs.add_file("/proc/stat", "cpu  5000 0 2000 40000 500 100 50 0 0 0\n");
        fs.add_file("/sys/class/powercap/intel-rapl:0/energy_uj", "250000000\n");
        fs.add_file("/sys/class/dmi/id/board_name", "21EXCTO1WW\n");

        fs.add_hwmon_chip("/sys", 0, "BAT0", &[("in0_input", "16451")]);
        fs.add_hwmon_chip(
            "/sys",
            1,
            "thinkpad",
            &[
                ("temp1_label", "CPU"),
                ("temp1_input", "48000"),
                ("temp2_label", "GPU"),
                ("temp2_input", "-128000"),
                ("fan1_input", "2950"),
            ],
        );
        let nvme = fs.add_hwmon_chip(
            "/sys",
            2,
            "nvme",
            &[("temp1_label", "Composite"), ("temp1_input", "39850")],
        );
        fs.add_file(nvme.join("device/model"), "SAMSUNG MZVL2512HCJQ-00BL7\n");
        fs.add_hwmon_chip(
            "/sys",
            3,
            "coretemp",
            &[
                ("temp1_label", "Package id 0"),
                ("temp1_input", "51000"),
                ("temp2_label", "Core 0"),
                ("temp2_input", "49000"),
                ("temp3_label", "Core 1"),
                ("temp3_input", "50000"),
            ],
        );

        fs
    }
}
