//! In-memory [`ImageEngine`] that records every call.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail};

use crate::cube::{Beam, CubeHeader, ImageCube};
use crate::engine::{ExportOptions, FeatherOptions, ImageEngine, Interpolation};

#[derive(Default)]
pub struct RecordingEngine {
    store: RefCell<HashMap<PathBuf, ImageCube>>,
    calls: RefCell<BTreeMap<&'static str, usize>>,
    regrids: RefCell<Vec<(PathBuf, PathBuf)>>,
    failing_outputs: HashSet<PathBuf>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, cube: ImageCube) {
        self.store.borrow_mut().insert(path.into(), cube);
    }

    /// Any operation writing to `path` fails.
    pub fn fail_writes_to(&mut self, path: impl Into<PathBuf>) {
        self.failing_outputs.insert(path.into());
    }

    pub fn get(&self, path: &Path) -> Option<ImageCube> {
        self.store.borrow().get(path).cloned()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.store.borrow().contains_key(path)
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls.borrow().get(method).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.borrow().values().sum()
    }

    /// `(input, output)` of every regrid, in call order.
    pub fn regrids(&self) -> Vec<(PathBuf, PathBuf)> {
        self.regrids.borrow().clone()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.store.borrow().keys().cloned().collect();
        paths.sort();
        paths
    }

    fn record(&self, method: &'static str) {
        *self.calls.borrow_mut().entry(method).or_insert(0) += 1;
    }

    fn load(&self, path: &Path) -> anyhow::Result<ImageCube> {
        let mut cube = self
            .store
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("No image at {}", path.display()))?;
        cube.set_name(path.display().to_string());
        Ok(cube)
    }

    fn store(&self, path: &Path, mut cube: ImageCube) -> anyhow::Result<()> {
        if self.failing_outputs.contains(path) {
            bail!("Injected failure writing {}", path.display());
        }
        cube.set_name(path.display().to_string());
        self.store.borrow_mut().insert(path.to_path_buf(), cube);
        Ok(())
    }
}

impl ImageEngine for RecordingEngine {
    fn exists(&self, path: &Path) -> bool {
        self.record("exists");
        self.contains(path)
    }

    fn read_header(&self, path: &Path) -> anyhow::Result<CubeHeader> {
        self.record("read_header");
        Ok(self.load(path)?.header().clone())
    }

    fn read_cube(&self, path: &Path) -> anyhow::Result<ImageCube> {
        self.record("read_cube");
        self.load(path)
    }

    fn write_cube(&self, path: &Path, cube: &ImageCube) -> anyhow::Result<()> {
        self.record("write_cube");
        self.store(path, cube.clone())
    }

    fn copy_dropdeg(&self, input: &Path, output: &Path) -> anyhow::Result<()> {
        self.record("copy_dropdeg");
        let cube = self.load(input)?;
        self.store(output, cube)
    }

    fn import_fits(&self, input: &Path, output: &Path) -> anyhow::Result<()> {
        self.record("import_fits");
        let cube = self.load(input)?;
        self.store(output, cube)
    }

    fn export_fits(
        &self,
        input: &Path,
        output: &Path,
        _options: &ExportOptions,
    ) -> anyhow::Result<()> {
        self.record("export_fits");
        let cube = self.load(input)?;
        self.store(output, cube)
    }

    /// Same-shape regrids copy the pixels; otherwise every output pixel takes
    /// the mean of the valid input pixels.
    fn regrid(
        &self,
        input: &Path,
        template: &CubeHeader,
        output: &Path,
        _interpolation: Interpolation,
    ) -> anyhow::Result<()> {
        self.record("regrid");
        self.regrids
            .borrow_mut()
            .push((input.to_path_buf(), output.to_path_buf()));
        if input == output {
            bail!("Cannot regrid {} onto itself", input.display());
        }
        let source = self.load(input)?;
        let mut header = template.clone();
        header.beam = source.header().beam.clone();
        header.brightness_unit = source.header().brightness_unit.clone();

        let regridded = if header.shape() == source.shape() {
            let (_, data, mask) = source.into_parts();
            ImageCube::new(header, data, mask)?
        } else {
            let valid: Vec<f64> = source
                .data()
                .iter()
                .zip(source.mask())
                .filter(|(v, m)| **m && v.is_finite())
                .map(|(v, _)| f64::from(*v))
                .collect();
            let fill = if valid.is_empty() {
                f32::NAN
            } else {
                (valid.iter().sum::<f64>() / valid.len() as f64) as f32
            };
            ImageCube::from_data(header.clone(), vec![fill; header.pixel_count()])?
        };
        self.store(output, regridded)
    }

    fn convolve(&self, input: &Path, output: &Path, target: &Beam) -> anyhow::Result<()> {
        self.record("convolve");
        let mut cube = self.load(input)?;
        cube.set_beam(Some(target.clone()));
        self.store(output, cube)
    }

    fn feather(
        &self,
        interferometer: &Path,
        single_dish: &Path,
        output: &Path,
        _options: &FeatherOptions,
    ) -> anyhow::Result<()> {
        self.record("feather");
        let sd = self.load(single_dish)?;
        let mut cube = self.load(interferometer)?;
        cube.ensure_same_shape(&sd)?;
        for ((v, s), m) in cube.data_mut().iter_mut().zip(sd.data()).zip(sd.mask()) {
            if *m {
                *v += *s;
            }
        }
        self.store(output, cube)
    }
}
