//! `sdist-ports list` command

use anyhow::Result;

use crate::cli::ListArgs;
use sdist_ports::ops::list_ports;

pub fn execute(args: ListArgs) -> Result<()> {
    for id in list_ports(args.name.as_deref())? {
        println!("{}", id);
    }
    Ok(())
}
