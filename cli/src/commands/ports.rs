use colored::*;
use sweepr_common::catalog::PortCatalog;

use crate::terminal::{colors, print};

pub fn ports(q_level: u8) {
    let catalog: &PortCatalog = PortCatalog::well_known();
    print::header("probed ports", q_level);

    let key_width: usize = catalog
        .iter()
        .map(|(port, _)| port.to_string().len())
        .max()
        .unwrap_or(0);
    for (port, service) in catalog.iter() {
        print::aligned_line(&port.to_string(), key_width, service.color(colors::SERVICE));
    }

    if q_level == 0 {
        print::fat_separator();
        print::centerln(&format!("{} ports per live host", catalog.len().to_string().bold()));
    }
}
