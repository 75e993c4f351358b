//! Site list: one station code per line, at columns [1, 5)
use std::path::Path;

use log::error;

use super::{field, read_lines};

/// Reads station codes (lowercased). Only lines starting with a blank
/// describe a station.
pub fn read_site_list(path: &Path) -> Option<Vec<String>> {
    let Some(lines) = read_lines(path) else {
        error!("site list not found");
        return None;
    };
    Some(
        lines
            .iter()
            .filter(|line| line.starts_with(' '))
            .map(|line| field(line, 1, 5).to_lowercase())
            .collect(),
    )
}

/// Writes the station codes, in the layout [read_site_list] understands.
pub fn write_site_list(path: &Path, sites: &[String]) -> std::io::Result<()> {
    let content = sites
        .iter()
        .map(|site| format!(" {:<4}\n", site.to_uppercase()))
        .collect::<String>();
    std::fs::write(path, content)
}

#[cfg(test)]
mod test {
    use super::{read_site_list, write_site_list};
    use crate::tests::toolkit::temp_path;

    #[test]
    fn site_list() {
        let path = temp_path("sites");
        std::fs::write(&path, "+SITE/ID\n ABMF  A\n AJAC\n*comment\n ALGO xx\n").unwrap();

        let sites = read_site_list(&path).unwrap();
        assert_eq!(sites, vec!["abmf", "ajac", "algo"]);

        write_site_list(&path, &sites[1..]).unwrap();
        assert_eq!(read_site_list(&path).unwrap(), vec!["ajac", "algo"]);

        std::fs::remove_file(&path).unwrap();
        assert!(read_site_list(&path).is_none());
    }
}
