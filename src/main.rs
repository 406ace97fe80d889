/*!
A MAC learning OpenFlow 1.4 controller.

Every switch that connects is served on its own thread and turned into
a learning bridge.
You can use mininet as a test switch.
To spawn an instance with 4 hosts you can run:

```sh
# mn --controller remote,port=6653 --topo single,4 --switch ovs,protocols=OpenFlow14
```
*/

#[macro_use]
extern crate clap;
#[macro_use]
extern crate log;

mod bridge;
mod conf;
mod openflow;
mod packet;

use crate::conf::Config;
use crate::openflow::buffer_pool::BufferPool;
use crate::openflow::{OfSession, XidGenerator};

use std::fmt;
use std::io;
use std::net;
use std::process::exit;
use std::sync::Arc;
use std::thread;

fn init_error<E: fmt::Display>(e: E) -> io::Error {
    let msg = format!("error on logging initialization: {}", e);
    io::Error::new(io::ErrorKind::Other, msg)
}

/// Reads command line arguments and calls the corresponding functions.
fn handle_cli_args() -> io::Result<()> {
    #[cfg(unix)]
    let unix_opts = "-s, --syslog      'Logs via syslog'
        ";
    #[cfg(not(unix))]
    let unix_opts = "";

    let usage = &format!(
        "{}-v...          'Repeat to set the level of verbosity'
        -c, --conf [ini]  'The INI configuration file'",
        unix_opts
    );
    let matches = app_from_crate!().args_from_usage(usage).get_matches();

    let log_lvl = match matches.occurrences_of("v") {
        0 => log::Level::Error,
        1 => log::Level::Warn,
        2 => log::Level::Info,
        3 => log::Level::Debug,
        _ => log::Level::Trace,
    };

    if matches.is_present("syslog") {
        #[cfg(unix)]
        {
            let app_name = Some(crate_name!());
            let filter = log_lvl.to_level_filter();
            syslog::init(syslog::Facility::LOG_USER, filter, app_name).map_err(init_error)?;
            log_panics::init();
        }
    }
    else {
        simple_logger::init_with_level(log_lvl).map_err(init_error)?;
    }

    let conf = match matches.value_of("conf") {
        Some(path) => conf::parse_file(path)?,
        None => {
            info!("No INI file given, using the defaults");
            Config::default()
        }
    };
    let conf = Arc::new(conf);
    let pool = Arc::new(BufferPool::new(conf.buffers.max_idle));
    let xids = Arc::new(XidGenerator::new());

    let listen_socket = net::TcpListener::bind(conf.connection.socket)?;
    info!("Listening on {}", listen_socket.local_addr()?);

    for stream in listen_socket.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                warn!("Accepting a connection failed: {}", e);
                continue;
            }
        };
        let (conf, pool, xids) = (conf.clone(), pool.clone(), xids.clone());
        let name = match stream.peer_addr() {
            Ok(addr) => format!("switch {}", addr),
            Err(_) => "switch".to_owned(),
        };
        let spawned = thread::Builder::new().name(name).spawn(move || {
            if let Err(e) = OfSession::run(stream, &conf, &pool, &xids) {
                error!("Session terminated: {}", e);
            }
            debug!("{} pool buffers allocated, {} idle", pool.allocated(), pool.idle());
        });
        if let Err(e) = spawned {
            error!("Spawning a session thread failed: {}", e);
        }
    }
    Ok(())
}

/// Entry function with top level error handling.
fn main() {
    if let Err(e) = handle_cli_args() {
        error!("{}", e);
        exit(1);
    }
}
