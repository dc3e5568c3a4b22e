use tracing::{info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The instruction-set architecture of a compilation target.
pub enum Arch {
    X86,
    I386,
    Amd64,
    Arm32,
    Arm64,
    RiscV32,
    RiscV64,
    Mips,
    Mips64,
    Sparc,
    Sparc64,
    Ppc,
    Ppc64,
    /// The UXN virtual machine (16-bit).
    Uxn,
    Wasm32,
    Wasm64,
    Jvm,
}

impl Arch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::X86 => "x86",
            Arch::I386 => "i386",
            Arch::Amd64 => "amd64",
            Arch::Arm32 => "ARM32",
            Arch::Arm64 => "ARM64",
            Arch::RiscV32 => "RISC-V32",
            Arch::RiscV64 => "RISC-V64",
            Arch::Mips => "MIPS32",
            Arch::Mips64 => "MIPS64",
            Arch::Sparc => "SPARC32",
            Arch::Sparc64 => "SPARC64",
            Arch::Ppc => "PowerPC32",
            Arch::Ppc64 => "PowerPC64",
            Arch::Uxn => "UXN virtual machine",
            Arch::Wasm32 => "WASM32",
            Arch::Wasm64 => "WASM64",
            Arch::Jvm => "JVM",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The operating system (or lack thereof) of a compilation target.
pub enum Os {
    /// Bare metal, no OS assumptions.
    None,
    Linux,
    Windows,
    MacOs,
    FreeBsd,
    OpenBsd,
    NetBsd,
    Solaris,
    Aix,
    /// WebAssembly System Interface.
    Wasi,
    /// Browser environment.
    Browser,
    /// Node.js environment.
    Node,
}

impl Os {
    pub fn as_str(&self) -> &'static str {
        match self {
            Os::None => "Bare metal / no OS",
            Os::Linux => "Linux",
            Os::Windows => "Windows",
            Os::MacOs => "macOS",
            Os::FreeBsd => "FreeBSD",
            Os::OpenBsd => "OpenBSD",
            Os::NetBsd => "NetBSD",
            Os::Solaris => "Solaris",
            Os::Aix => "IBM AIX",
            Os::Wasi => "WebAssembly System Interface",
            Os::Browser => "Browser environment",
            Os::Node => "Node.js environment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The object file format the backend is expected to emit.
pub enum ObjectFormat {
    /// Raw binary, no container format.
    Binary,
    Elf32,
    Elf64,
    Pe32,
    Pe64,
    MachO32,
    MachO64,
    Coff,
    XCoff,
    Wasm,
    ClassFile,
    UxnRom,
    Bytecode,
}

impl ObjectFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectFormat::Binary => "Raw binary (no format)",
            ObjectFormat::Elf32 => "32-bit ELF",
            ObjectFormat::Elf64 => "64-bit ELF",
            ObjectFormat::Pe32 => "32-bit Portable Executable",
            ObjectFormat::Pe64 => "64-bit Portable Executable (PE+)",
            ObjectFormat::MachO32 => "32-bit Mach-O",
            ObjectFormat::MachO64 => "64-bit Mach-O",
            ObjectFormat::Coff => "Common Object File Format",
            ObjectFormat::XCoff => "Extended COFF (AIX)",
            ObjectFormat::Wasm => "WebAssembly module",
            ObjectFormat::ClassFile => "Java Class file",
            ObjectFormat::UxnRom => "UXN ROM format",
            ObjectFormat::Bytecode => "Generic bytecode format",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The byte order of the target architecture.
pub enum Endian {
    Little,
    Big,
    /// Use the architecture's default byte order.
    Auto,
}

impl Endian {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endian::Little => "Little endian",
            Endian::Big => "Big endian",
            Endian::Auto => "Use architecture default",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Describes the compilation target.
///
/// This is the library's equivalent of a target triple: the architecture,
/// operating system, object format, and endianness drive every layout and
/// codegen decision, while `vendor`/`env`/`version` are carried through for
/// diagnostics and symbol mangling.
pub struct Target {
    pub arch: Arch,
    pub os: Os,
    pub format: ObjectFormat,
    pub endian: Endian,
    pub vendor: String,
    pub env: String,
    pub version: String,
}

impl Target {
    #[instrument]
    pub fn new(arch: Arch, os: Os, format: ObjectFormat, endian: Endian) -> Self {
        let target = Target {
            arch,
            os,
            format,
            endian,
            vendor: "unknown".to_string(),
            env: "unknown".to_string(),
            version: String::new(),
        };
        info!("Target created: {:?}", target);
        target
    }

    /// The target describing the machine the compiler itself runs on.
    ///
    /// Host detection is deliberately coarse: the only execution environment
    /// the backend currently understands is freestanding little-endian AMD64
    /// emitting raw binaries, so that is what "host" means here.
    pub fn host() -> Self {
        Target {
            arch: Arch::Amd64,
            os: Os::None,
            format: ObjectFormat::Binary,
            endian: Endian::Little,
            vendor: "pc".to_string(),
            env: "gnu".to_string(),
            version: "1.0.0".to_string(),
        }
    }

    /// The width of a pointer on this target, in bits.
    pub fn pointer_size(&self) -> u64 {
        match self.arch {
            Arch::Amd64
            | Arch::Arm64
            | Arch::RiscV64
            | Arch::Mips64
            | Arch::Sparc64
            | Arch::Ppc64
            | Arch::Wasm64 => 64,
            Arch::X86
            | Arch::I386
            | Arch::Arm32
            | Arch::RiscV32
            | Arch::Mips
            | Arch::Sparc
            | Arch::Ppc
            | Arch::Wasm32
            | Arch::Jvm => 32,
            Arch::Uxn => 16,
        }
    }

    /// The natural machine word width on this target, in bits.
    ///
    /// For every architecture listed here the word width matches the
    /// addressing width.
    pub fn word_size(&self) -> u64 {
        self.pointer_size()
    }

    /// Whether the backend can actually generate code for this target.
    ///
    /// The supported set is currently `{amd64, bare metal, raw binary,
    /// little endian}`.
    pub fn is_supported(&self) -> bool {
        self.endian == Endian::Little
            && self.os == Os::None
            && self.format == ObjectFormat::Binary
            && self.arch == Arch::Amd64
    }

    /// Log a one-line human-readable summary of this target.
    pub fn log_summary(&self) {
        info!(
            "{} - ({} | {} | {}) - ({} | {}) - {} - (word({}) | addr({}))",
            self.os.as_str(),
            self.arch.as_str(),
            self.format.as_str(),
            self.endian.as_str(),
            self.vendor,
            self.env,
            self.version,
            self.word_size(),
            self.pointer_size(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amd64_word_and_pointer_sizes_agree() {
        let host = Target::host();
        assert_eq!(host.pointer_size(), 64);
        assert_eq!(host.word_size(), 64);
    }

    #[test]
    fn host_target_is_supported() {
        assert!(Target::host().is_supported());
    }

    #[test]
    fn non_amd64_targets_are_not_supported() {
        let mut t = Target::host();
        t.arch = Arch::RiscV64;
        assert!(!t.is_supported());

        let mut t = Target::host();
        t.endian = Endian::Big;
        assert!(!t.is_supported());
    }

    #[test]
    fn thirty_two_bit_targets_report_32_bit_words() {
        let t = Target::new(Arch::RiscV32, Os::None, ObjectFormat::Binary, Endian::Little);
        assert_eq!(t.word_size(), 32);
        assert_eq!(t.pointer_size(), 32);
    }
}
