//! tablekv CLI Client
//!
//! Command-line interface for one-off requests against a table server.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tablekv::{
    archive, Client, ColumnSpace, Config, DelArgs, DumpRecord, GetArgs, IncrArgs, ScanArgs,
    SetArgs, Status, TableError,
};
use tracing_subscriber::{fmt, EnvFilter};

/// tablekv CLI
#[derive(Parser, Debug)]
#[command(name = "tablekv-cli")]
#[command(about = "CLI for a sharded table key-value store")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:6688")]
    server: String,

    /// Database to select
    #[arg(short, long, default_value = "0")]
    db: u8,

    /// Password for the selected database
    #[arg(short, long)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ping the server
    Ping,

    /// Get a column
    Get { table: u8, row: String, col: String },

    /// Get a scored column
    Zget { table: u8, row: String, col: String },

    /// Set a column
    Set {
        table: u8,
        row: String,
        col: String,
        value: String,
        #[arg(default_value = "0")]
        score: i64,
        /// Expected CAS token
        #[arg(long, default_value = "0")]
        cas: u32,
    },

    /// Set a scored column
    Zset {
        table: u8,
        row: String,
        col: String,
        value: String,
        #[arg(default_value = "0")]
        score: i64,
        #[arg(long, default_value = "0")]
        cas: u32,
    },

    /// Delete a column
    Del { table: u8, row: String, col: String },

    /// Delete a scored column
    Zdel { table: u8, row: String, col: String },

    /// Add to a column's score
    Incr {
        table: u8,
        row: String,
        col: String,
        #[arg(default_value = "1")]
        score: i64,
    },

    /// Add to a scored column's score
    Zincr {
        table: u8,
        row: String,
        col: String,
        #[arg(default_value = "1")]
        score: i64,
    },

    /// Scan the columns of a row
    Scan {
        table: u8,
        row: String,
        #[arg(short, long, default_value = "10")]
        num: i32,
        #[arg(long)]
        desc: bool,
    },

    /// Scan the scored columns of a row
    Zscan {
        table: u8,
        row: String,
        #[arg(short, long, default_value = "10")]
        num: i32,
        #[arg(long)]
        desc: bool,
        /// Order by score instead of column key
        #[arg(long)]
        by_score: bool,
    },

    /// Dump the database, or one table
    Dump {
        #[arg(short, long)]
        table: Option<u8>,
        /// Write the records to an archive file instead of printing them
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tablekv=debug"));

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> tablekv::Result<()> {
    let config = Config::builder().server_addr(&args.server).build();
    let mut client = Client::connect(config)?;

    if let Some(password) = &args.password {
        client.auth(args.db, password)?;
    }
    client.select(args.db)?;

    match args.command {
        Commands::Ping => {
            client.ping()?;
            println!("PONG");
        }
        Commands::Get { table, row, col } => {
            get(&mut client, ColumnSpace::Plain, table, row, col)?
        }
        Commands::Zget { table, row, col } => {
            get(&mut client, ColumnSpace::Scored, table, row, col)?
        }
        Commands::Set {
            table,
            row,
            col,
            value,
            score,
            cas,
        } => {
            let args = SetArgs::new(table, row, col, value, score).with_cas(cas);
            write_result(client.set(ColumnSpace::Plain, &args).map(|_| ()))?;
        }
        Commands::Zset {
            table,
            row,
            col,
            value,
            score,
            cas,
        } => {
            let args = SetArgs::new(table, row, col, value, score).with_cas(cas);
            write_result(client.set(ColumnSpace::Scored, &args).map(|_| ()))?;
        }
        Commands::Del { table, row, col } => {
            let args = DelArgs::new(table, row, col);
            write_result(client.del(ColumnSpace::Plain, &args).map(|_| ()))?;
        }
        Commands::Zdel { table, row, col } => {
            let args = DelArgs::new(table, row, col);
            write_result(client.del(ColumnSpace::Scored, &args).map(|_| ()))?;
        }
        Commands::Incr {
            table,
            row,
            col,
            score,
        } => {
            let args = IncrArgs::new(table, row, col, score);
            let reply = client.incr(ColumnSpace::Plain, &args)?;
            println!("{}", reply.score);
        }
        Commands::Zincr {
            table,
            row,
            col,
            score,
        } => {
            let args = IncrArgs::new(table, row, col, score);
            let reply = client.incr(ColumnSpace::Scored, &args)?;
            println!("{}", reply.score);
        }
        Commands::Scan {
            table,
            row,
            num,
            desc,
        } => {
            let mut scan = ScanArgs::new(table, row, num);
            if desc {
                scan = scan.desc();
            }
            print_scan(&mut client, &scan)?;
        }
        Commands::Zscan {
            table,
            row,
            num,
            desc,
            by_score,
        } => {
            let mut scan = ScanArgs::new(table, row, num).scored(by_score);
            if desc {
                scan = scan.desc();
            }
            print_scan(&mut client, &scan)?;
        }
        Commands::Dump { table, out } => {
            let records = dump_all(&mut client, table)?;
            match out {
                Some(path) => {
                    archive::write_archive(&path, &records)?;
                    println!("{} records written to {}", records.len(), path.display());
                }
                None => print_records(&records),
            }
        }
    }
    Ok(())
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn get(
    client: &mut Client,
    space: ColumnSpace,
    table: u8,
    row: String,
    col: String,
) -> tablekv::Result<()> {
    let reply = client.get(space, &GetArgs::new(table, row, col))?;
    if !reply.found() {
        println!("(nil)");
    } else if space.is_scored() {
        println!("{}\t{:?}", reply.score, text(&reply.value));
    } else {
        println!("{:?}", text(&reply.value));
    }
    Ok(())
}

fn write_result(result: tablekv::Result<()>) -> tablekv::Result<()> {
    match result {
        Ok(()) => println!("OK"),
        Err(TableError::Server(Status::CasNotMatch)) => println!("CAS not match"),
        Err(e) => return Err(e),
    }
    Ok(())
}

fn print_scan(client: &mut Client, args: &ScanArgs) -> tablekv::Result<()> {
    let reply = client.scan(args)?;
    if reply.kvs.is_empty() {
        println!("no record!");
        return Ok(());
    }
    for (i, kv) in reply.kvs.iter().enumerate() {
        println!(
            "{:02}) [{:?}\t{}]\t[{:?}]",
            i,
            text(&kv.col_key),
            kv.score,
            text(&kv.value)
        );
    }
    Ok(())
}

fn dump_all(client: &mut Client, table: Option<u8>) -> tablekv::Result<Vec<DumpRecord>> {
    let mut reply = match table {
        Some(table_id) => client.dump_table(table_id)?,
        None => client.dump_db()?,
    };
    let mut records = std::mem::take(&mut reply.kvs);
    while !reply.end {
        reply = client.dump_more(&reply)?;
        records.append(&mut reply.kvs);
    }
    Ok(records)
}

fn print_records(records: &[DumpRecord]) {
    if records.is_empty() {
        println!("no record!");
        return;
    }
    for (i, kv) in records.iter().enumerate() {
        println!(
            "{:02}) [{}\t{:?}\t{:?}\t{:?}]\t[{}\t{:?}]",
            i,
            kv.table_id,
            kv.space,
            text(&kv.row_key),
            text(&kv.col_key),
            kv.score,
            text(&kv.value)
        );
    }
}
