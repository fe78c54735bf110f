use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "utunfd")]
#[command(about = "Inspect and resolve tunnel control-socket descriptors", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the raw descriptor backing a tunnel interface
    Resolve {
        /// Interface name (e.g. utun3)
        interface: String,
    },

    /// List the kernel-control sockets open in this process
    Scan,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Resolve { interface } => resolve(&interface),
        Commands::Scan => scan(),
    }
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
fn resolve(interface: &str) -> anyhow::Result<()> {
    use utunfd::resolve::tunnel_descriptor;
    use utunfd::table::{ProcessTable, utun_name};

    let resolved = tunnel_descriptor(&ProcessTable, interface)?;
    let confirmed = utun_name(resolved.fd).unwrap_or_else(|_| "-".to_string());
    println!("fd {} ({}, kernel reports {})", resolved.fd, resolved.interface, confirmed);
    Ok(())
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
fn scan() -> anyhow::Result<()> {
    use tabled::{Table, Tabled};
    use utunfd::table::{DescriptorTable, ProcessTable, utun_name};

    #[derive(Tabled)]
    struct ControlSocketRow {
        #[tabled(rename = "FD")]
        fd: i32,
        #[tabled(rename = "CTL_ID")]
        ctl_id: u32,
        #[tabled(rename = "UNIT")]
        unit: u32,
        #[tabled(rename = "INTERFACE")]
        interface: String,
    }

    let table = ProcessTable;
    let mut rows = Vec::new();
    for fd in 0..table.descriptor_limit() {
        let Some(addr) = table.control_bound_address(fd) else {
            continue;
        };
        rows.push(ControlSocketRow {
            fd,
            ctl_id: addr.sc_id,
            unit: addr.sc_unit,
            interface: utun_name(fd).unwrap_or_else(|_| "-".to_string()),
        });
    }

    if rows.is_empty() {
        println!("no kernel-control sockets open");
    } else {
        println!("{}", Table::new(rows));
    }
    Ok(())
}

#[cfg(not(any(target_os = "macos", target_os = "ios")))]
fn resolve(_interface: &str) -> anyhow::Result<()> {
    anyhow::bail!("kernel-control sockets require a macOS or iOS host")
}

#[cfg(not(any(target_os = "macos", target_os = "ios")))]
fn scan() -> anyhow::Result<()> {
    anyhow::bail!("kernel-control sockets require a macOS or iOS host")
}
