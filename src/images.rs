//! The `Binary Images:` section of a text crash report.

use once_cell::sync::Lazy;
use regex::Regex;

const SECTION_HEADER: &str = "Binary Images:";

// 0x104720000 - 0x1048bffff MyApp arm64  <2b7c7f3e9d1a3c1b8e3f4d5a6b7c8d9e> /var/containers/.../MyApp
static IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(0x[a-fA-F0-9]+)\s+-\s+(0x[a-fA-F0-9]+)\s+\+?(\S+)\s+(\S+)\s+<([a-fA-F0-9-]+)>\s+(.*)$",
    )
    .expect("binary image pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryImage {
    pub load_address: String,
    pub end_address: String,
    pub name: String,
    pub arch: String,
    pub uuid: String,
    pub path: String,
}

impl BinaryImage {
    fn parse(line: &str) -> Option<Self> {
        let captures = IMAGE.captures(line)?;
        let group = |index| captures.get(index).map(|m| m.as_str().to_owned());
        Some(Self {
            load_address: group(1)?,
            end_address: group(2)?,
            name: group(3)?,
            arch: group(4)?,
            uuid: group(5)?,
            path: group(6)?.trim().to_owned(),
        })
    }
}

/// Every parseable entry after the `Binary Images:` header.
pub fn binary_images(report: &str) -> Vec<BinaryImage> {
    report
        .lines()
        .skip_while(|line| !line.starts_with(SECTION_HEADER))
        .skip(1)
        .filter_map(BinaryImage::parse)
        .collect()
}

/// The first listed image is the main executable; its architecture is what atos needs.
pub fn main_image(report: &str) -> Option<BinaryImage> {
    binary_images(report).into_iter().next()
}

pub fn detect_arch(report: &str) -> Option<String> {
    main_image(report).map(|image| image.arch)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "\
Incident Identifier: 6A2F
Hardware Model:      iPhone14,2

Thread 0 Crashed:
0   Demo                          0x0000000104724abc 0x104720000 + 19132

Binary Images:
0x104720000 - 0x1048bffff Demo arm64  <2b7c7f3e9d1a3c1b8e3f4d5a6b7c8d9e> /private/var/containers/Bundle/Application/X/Demo.app/Demo
0x1a2b3c000 - 0x1a2b7ffff libsystem_kernel.dylib arm64e  <aabbccddeeff00112233445566778899> /usr/lib/system/libsystem_kernel.dylib
";

    #[test]
    fn parses_main_image() {
        let image = main_image(REPORT).unwrap();
        assert_eq!(image.load_address, "0x104720000");
        assert_eq!(image.name, "Demo");
        assert_eq!(image.arch, "arm64");
        assert_eq!(
            image.path,
            "/private/var/containers/Bundle/Application/X/Demo.app/Demo"
        );
    }

    #[test]
    fn lists_all_images() {
        let images = binary_images(REPORT);
        assert_eq!(images.len(), 2);
        assert_eq!(images[1].arch, "arm64e");
    }

    #[test]
    fn plus_prefixed_names_are_accepted() {
        let line = "0x100000000 - 0x100ffffff +Demo x86_64  <00112233445566778899aabbccddeeff> /Applications/Demo.app/Contents/MacOS/Demo";
        let image = BinaryImage::parse(line).unwrap();
        assert_eq!(image.name, "Demo");
        assert_eq!(image.arch, "x86_64");
    }

    #[test]
    fn no_section_means_no_arch() {
        assert_eq!(detect_arch("Thread 0 Crashed:\n0 Demo 0x1\n"), None);
    }
}
