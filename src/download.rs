//! Stage3 resolution, download and verification.
//!
//! The mirror publishes `latest-stage3-amd64-<init>.txt`, a (PGP clearsigned)
//! index naming the newest tarball relative to `releases/amd64/autobuilds/`.
//! Next to each tarball sits `<tarball>.DIGESTS` listing BLAKE2B and SHA512
//! sums. The tarball is only trusted once its SHA-512 matches.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha512};
use tracing::{info, warn};

use crate::error::{InstallError, Result};
use crate::types::InitSystem;

/// Where stage3 artifacts live under a mirror.
pub const AUTOBUILDS_PATH: &str = "releases/amd64/autobuilds";

// ============================================================================
// Fetching
// ============================================================================

/// Source of remote files.
pub trait Fetcher {
    /// Fetch a small text document.
    fn fetch_text(&self, url: &str) -> Result<String>;

    /// Stream `url` into `dest`, returning the number of bytes written.
    fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<u64>;
}

/// Blocking HTTP(S) fetcher with a progress bar for large files.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("gentoo-install/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            // Tarballs are large; no overall timeout.
            .timeout(None)
            .build()?;
        Ok(Self { client })
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response> {
        let response = self.client.get(url).send()?;
        if !response.status().is_success() {
            return Err(InstallError::download(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }
        Ok(response)
    }
}

impl Fetcher for HttpFetcher {
    fn fetch_text(&self, url: &str) -> Result<String> {
        info!("Fetching {}", url);
        Ok(self.get(url)?.text()?)
    }

    fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<u64> {
        info!("Downloading {} -> {}", url, dest.display());
        let mut response = self.get(url)?;

        let bar = match response.content_length() {
            Some(len) => ProgressBar::new(len),
            None => ProgressBar::new_spinner(),
        };
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner} [{elapsed_precise}] [{bar:40}] {bytes}/{total_bytes} ({bytes_per_sec})",
        ) {
            bar.set_style(style.progress_chars("=> "));
        }

        let mut file = File::create(dest)?;
        let mut buf = vec![0u8; 64 * 1024];
        let mut written = 0u64;
        loop {
            let n = response.read(&mut buf)?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n])?;
            written += n as u64;
            bar.set_position(written);
        }
        file.flush()?;
        bar.finish_and_clear();

        info!("Downloaded {} bytes", written);
        Ok(written)
    }
}

/// In-memory fetcher serving fixed documents by URL.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    documents: HashMap<String, Vec<u8>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.documents.insert(url.into(), body.into());
        self
    }

    fn body(&self, url: &str) -> Result<&[u8]> {
        self.documents
            .get(url)
            .map(Vec::as_slice)
            .ok_or_else(|| InstallError::download(format!("HTTP 404 Not Found from {}", url)))
    }
}

impl Fetcher for StaticFetcher {
    fn fetch_text(&self, url: &str) -> Result<String> {
        Ok(String::from_utf8_lossy(self.body(url)?).into_owned())
    }

    fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<u64> {
        let body = self.body(url)?;
        fs::write(dest, body)?;
        Ok(body.len() as u64)
    }
}

// ============================================================================
// Index and digests
// ============================================================================

/// URL of the "latest stage3" index for an init flavour.
pub fn index_url(mirror: &str, init: InitSystem) -> String {
    format!(
        "{}/{}/latest-stage3-amd64-{}.txt",
        mirror.trim_end_matches('/'),
        AUTOBUILDS_PATH,
        init
    )
}

/// URL of a file given its path relative to the autobuilds directory.
pub fn autobuild_url(mirror: &str, relative: &str) -> String {
    format!("{}/{}/{}", mirror.trim_end_matches('/'), AUTOBUILDS_PATH, relative)
}

/// Extract the tarball path from a latest-stage3 index.
///
/// Skips the clearsign header, comments and blank lines and stops at the
/// signature block. The first remaining line is `<path> <size>`.
pub fn parse_latest_index(index: &str) -> Result<String> {
    for line in index.lines() {
        let line = line.trim();
        if line.starts_with("-----BEGIN PGP SIGNATURE-----") {
            break;
        }
        if line.is_empty()
            || line.starts_with('#')
            || line.starts_with("-----")
            || line.starts_with("Hash:")
        {
            continue;
        }
        if let Some(path) = line.split_whitespace().next() {
            if path.ends_with(".tar.xz") {
                return Ok(path.to_string());
            }
        }
    }
    Err(InstallError::parse("no stage3 tarball listed in index"))
}

/// SHA-512 of `filename` from a `.DIGESTS` file.
///
/// Only lines inside the `# SHA512 HASH` section count; the file also lists
/// BLAKE2B sums of the same length.
pub fn parse_sha512_digest(digests: &str, filename: &str) -> Result<String> {
    let mut in_sha512 = false;
    for line in digests.lines() {
        let line = line.trim();
        if line.starts_with('#') {
            in_sha512 = line.eq_ignore_ascii_case("# SHA512 HASH");
            continue;
        }
        if !in_sha512 {
            continue;
        }
        let mut fields = line.split_whitespace();
        if let (Some(hash), Some(name)) = (fields.next(), fields.next()) {
            if name == filename && hash.len() == 128 {
                return Ok(hash.to_ascii_lowercase());
            }
        }
    }
    Err(InstallError::parse(format!(
        "no SHA512 digest for {} in DIGESTS",
        filename
    )))
}

/// Hex SHA-512 of a file.
pub fn sha512_file(path: &Path) -> Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha512::new();
    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Check that `path` exists, is non-empty and hashes to `expected`.
pub fn verify_sha512(path: &Path, expected: &str) -> Result<()> {
    let len = fs::metadata(path)?.len();
    if len == 0 {
        return Err(InstallError::download(format!("{} is empty", path.display())));
    }
    let actual = sha512_file(path)?;
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(InstallError::Checksum {
            file: path.display().to_string(),
            expected: expected.to_string(),
            actual,
        })
    }
}

// ============================================================================
// Stage3
// ============================================================================

/// A resolved stage3 tarball and where it lands locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage3 {
    /// Path relative to the autobuilds directory
    pub relative: String,
    /// Local tarball path
    pub tarball: PathBuf,
    /// Local DIGESTS path
    pub digests: PathBuf,
}

impl Stage3 {
    pub fn filename(&self) -> &str {
        self.relative.rsplit('/').next().unwrap_or(&self.relative)
    }
}

/// Find the newest stage3 for `init` and decide where it goes under `dest_dir`.
pub fn resolve_stage3(
    fetcher: &dyn Fetcher,
    mirror: &str,
    init: InitSystem,
    dest_dir: &Path,
) -> Result<Stage3> {
    let index = fetcher.fetch_text(&index_url(mirror, init))?;
    let relative = parse_latest_index(&index)?;
    let filename = relative.rsplit('/').next().unwrap_or(&relative).to_string();
    info!("Latest stage3: {}", relative);
    Ok(Stage3 {
        tarball: dest_dir.join(&filename),
        digests: dest_dir.join(format!("{}.DIGESTS", filename)),
        relative,
    })
}

/// Whether a previous run already left a verified tarball behind.
fn already_verified(stage3: &Stage3) -> bool {
    if !stage3.tarball.is_file() || !stage3.digests.is_file() {
        return false;
    }
    let check = fs::read_to_string(&stage3.digests)
        .map_err(InstallError::from)
        .and_then(|digests| parse_sha512_digest(&digests, stage3.filename()))
        .and_then(|expected| verify_sha512(&stage3.tarball, &expected));
    match check {
        Ok(()) => true,
        Err(e) => {
            warn!("Existing {} not usable: {}", stage3.tarball.display(), e);
            false
        }
    }
}

/// Download and verify the newest stage3 into `dest_dir`.
///
/// Skipped when a tarball with a matching digest is already present.
pub fn fetch_stage3(
    fetcher: &dyn Fetcher,
    mirror: &str,
    init: InitSystem,
    dest_dir: &Path,
) -> Result<Stage3> {
    let stage3 = resolve_stage3(fetcher, mirror, init, dest_dir)?;
    if already_verified(&stage3) {
        info!(
            "{} already downloaded and verified, skipping download",
            stage3.filename()
        );
        return Ok(stage3);
    }

    let tarball_url = autobuild_url(mirror, &stage3.relative);
    fetcher.fetch_to_file(&format!("{}.DIGESTS", tarball_url), &stage3.digests)?;
    fetcher.fetch_to_file(&tarball_url, &stage3.tarball)?;

    let digests = fs::read_to_string(&stage3.digests)?;
    let expected = parse_sha512_digest(&digests, stage3.filename())?;
    verify_sha512(&stage3.tarball, &expected)?;
    info!("SHA512 verified for {}", stage3.filename());
    Ok(stage3)
}

/// A stage3 tarball left in `dir` by `fetch_stage3`, if any.
pub fn find_stage3_tarball(dir: &Path) -> Result<Option<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut found = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_stage3 = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("stage3-") && n.ends_with(".tar.xz"));
        if is_stage3 && path.is_file() {
            found.push(path);
        }
    }
    found.sort();
    Ok(found.pop())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MIRROR: &str = "https://distfiles.gentoo.org/";
    const RELATIVE: &str = "20240929T163611Z/stage3-amd64-openrc-20240929T163611Z.tar.xz";
    const FILENAME: &str = "stage3-amd64-openrc-20240929T163611Z.tar.xz";

    fn index() -> String {
        format!(
            "-----BEGIN PGP SIGNED MESSAGE-----\nHash: SHA512\n\n\
             # Latest as of Sun, 29 Sep 2024 18:30:02 +0000\n# ts=1727634602\n\
             {} 287090304\n\
             -----BEGIN PGP SIGNATURE-----\n\niQIzBAEBCgAdFiEE\n-----END PGP SIGNATURE-----\n",
            RELATIVE
        )
    }

    fn digests_for(body: &[u8]) -> String {
        let sha512 = hex::encode(Sha512::digest(body));
        format!(
            "# BLAKE2B HASH\n{blake}  {name}\n\
             # SHA512 HASH\n{sha}  {name}.CONTENTS.gz\n{sha}  {name}\n",
            blake = "b".repeat(128),
            sha = sha512,
            name = FILENAME
        )
    }

    #[test]
    fn test_index_url() {
        assert_eq!(
            index_url(MIRROR, InitSystem::Systemd),
            "https://distfiles.gentoo.org/releases/amd64/autobuilds/latest-stage3-amd64-systemd.txt"
        );
    }

    #[test]
    fn test_parse_latest_index_skips_signature_and_comments() {
        assert_eq!(parse_latest_index(&index()).unwrap(), RELATIVE);
        assert!(parse_latest_index("# nothing here\n").is_err());
    }

    #[test]
    fn test_parse_sha512_ignores_blake2b_section() {
        let digests = digests_for(b"tarball");
        let sha = parse_sha512_digest(&digests, FILENAME).unwrap();
        assert_eq!(sha, hex::encode(Sha512::digest(b"tarball")));
        assert!(parse_sha512_digest(&digests, "other.tar.xz").is_err());
    }

    #[test]
    fn test_verify_sha512() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file");
        fs::write(&path, b"hello").unwrap();

        let good = hex::encode(Sha512::digest(b"hello"));
        verify_sha512(&path, &good).unwrap();

        let err = verify_sha512(&path, &"0".repeat(128)).unwrap_err();
        assert!(matches!(err, InstallError::Checksum { .. }));

        fs::write(&path, b"").unwrap();
        assert!(matches!(
            verify_sha512(&path, &good).unwrap_err(),
            InstallError::Download(_)
        ));
    }

    #[test]
    fn test_fetch_stage3_downloads_and_verifies() {
        let dir = TempDir::new().unwrap();
        let body = b"not really a tarball".to_vec();
        let tarball_url = autobuild_url(MIRROR, RELATIVE);
        let fetcher = StaticFetcher::new()
            .with(index_url(MIRROR, InitSystem::OpenRc), index())
            .with(format!("{}.DIGESTS", tarball_url), digests_for(&body))
            .with(tarball_url, body.clone());

        let stage3 = fetch_stage3(&fetcher, MIRROR, InitSystem::OpenRc, dir.path()).unwrap();
        assert_eq!(stage3.tarball, dir.path().join(FILENAME));
        assert_eq!(fs::read(&stage3.tarball).unwrap(), body);
    }

    #[test]
    fn test_fetch_stage3_rejects_tampered_tarball() {
        let dir = TempDir::new().unwrap();
        let tarball_url = autobuild_url(MIRROR, RELATIVE);
        let fetcher = StaticFetcher::new()
            .with(index_url(MIRROR, InitSystem::OpenRc), index())
            .with(format!("{}.DIGESTS", tarball_url), digests_for(b"original"))
            .with(tarball_url, b"tampered".to_vec());

        let err = fetch_stage3(&fetcher, MIRROR, InitSystem::OpenRc, dir.path()).unwrap_err();
        assert!(matches!(err, InstallError::Checksum { .. }));
    }

    #[test]
    fn test_fetch_stage3_skips_verified_tarball() {
        let dir = TempDir::new().unwrap();
        let body = b"already here".to_vec();
        fs::write(dir.path().join(FILENAME), &body).unwrap();
        fs::write(
            dir.path().join(format!("{}.DIGESTS", FILENAME)),
            digests_for(&body),
        )
        .unwrap();

        // Only the index is served: any download attempt would fail.
        let fetcher = StaticFetcher::new().with(index_url(MIRROR, InitSystem::OpenRc), index());
        fetch_stage3(&fetcher, MIRROR, InitSystem::OpenRc, dir.path()).unwrap();
    }

    #[test]
    fn test_find_stage3_tarball() {
        let dir = TempDir::new().unwrap();
        assert_eq!(find_stage3_tarball(dir.path()).unwrap(), None);

        fs::write(dir.path().join(FILENAME), b"x").unwrap();
        fs::write(dir.path().join(format!("{}.DIGESTS", FILENAME)), b"x").unwrap();
        assert_eq!(
            find_stage3_tarball(dir.path()).unwrap(),
            Some(dir.path().join(FILENAME))
        );
    }
}
