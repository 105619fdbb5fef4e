//! The three textures the denoiser consumes.

use color_eyre::{eyre::WrapErr as _, Result};

/// The default file names of the reference inputs, in load order.
pub const DEFAULT_ALBEDO: &str = "spp_benchmark_4k_512_reference_optix_input_albedo.dds";
/// See [`DEFAULT_ALBEDO`].
pub const DEFAULT_COLOR: &str = "spp_benchmark_4k_512_reference_optix_input_color.dds";
/// See [`DEFAULT_ALBEDO`].
pub const DEFAULT_NORMAL: &str = "spp_benchmark_4k_512_reference_optix_input_normal.dds";

/// The kind of layer each input provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    /// The raw albedo of the scene, used as a guide.
    Albedo,
    /// The noisy beauty render, the image that is actually denoised.
    Color,
    /// The scene normals, used as a guide.
    Normal,
}

impl InputKind {
    /// Every kind, in the order inputs are loaded and uploaded.
    pub const ALL: [Self; crate::layout::INPUT_COUNT] = [Self::Albedo, Self::Color, Self::Normal];

    /// Position within [`Self::ALL`], and so within the concatenated device buffer.
    pub const fn index(self) -> usize {
        match self {
            Self::Albedo => 0,
            Self::Color => 1,
            Self::Normal => 2,
        }
    }
}

impl std::fmt::Display for InputKind {
    #[expect(clippy::min_ident_chars, reason = "This is from `std`")]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Albedo => "albedo",
            Self::Color => "color",
            Self::Normal => "normal",
        };
        f.write_str(name)
    }
}

/// One value per input kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSet<T> {
    /// The albedo slot.
    pub albedo: T,
    /// The color slot.
    pub color: T,
    /// The normal slot.
    pub normal: T,
}

impl<T> InputSet<T> {
    /// Get the value for a kind.
    pub const fn get(&self, kind: InputKind) -> &T {
        match kind {
            InputKind::Albedo => &self.albedo,
            InputKind::Color => &self.color,
            InputKind::Normal => &self.normal,
        }
    }

    /// Iterate over the values in load order.
    pub fn iter(&self) -> impl Iterator<Item = (InputKind, &T)> {
        InputKind::ALL.into_iter().map(|kind| (kind, self.get(kind)))
    }

    /// Consume the set, yielding values in load order.
    pub fn into_ordered(self) -> [(InputKind, T); crate::layout::INPUT_COUNT] {
        [
            (InputKind::Albedo, self.albedo),
            (InputKind::Color, self.color),
            (InputKind::Normal, self.normal),
        ]
    }

    /// Build a set by running a fallible function for every kind, in load order.
    pub fn try_from_fn(mut function: impl FnMut(InputKind) -> Result<T>) -> Result<Self> {
        Ok(Self {
            albedo: function(InputKind::Albedo)?,
            color: function(InputKind::Color)?,
            normal: function(InputKind::Normal)?,
        })
    }
}

impl Default for InputSet<String> {
    fn default() -> Self {
        Self {
            albedo: DEFAULT_ALBEDO.to_owned(),
            color: DEFAULT_COLOR.to_owned(),
            normal: DEFAULT_NORMAL.to_owned(),
        }
    }
}

/// The loaded inputs, ready to be uploaded.
#[derive(Debug)]
pub struct Inputs {
    /// The decoded textures.
    pub textures: InputSet<crate::dds::Texture>,
    /// The common resolution of all the textures.
    pub resolution: crate::layout::Resolution,
    /// A copy of the first input, whose container receives the denoised pixels.
    pub output: crate::dds::Texture,
}

impl Inputs {
    /// Load all the inputs from a directory.
    pub fn load(directory: &std::path::Path, names: &InputSet<String>) -> Result<Self> {
        let mut max_resolution = crate::layout::Resolution::default();

        let textures = InputSet::try_from_fn(|kind| {
            let path = directory.join(names.get(kind));
            tracing::info!("Loading {kind} input from: {}", path.display());
            let texture = crate::dds::Texture::read(&path)
                .wrap_err_with(|| format!("Couldn't load {kind} input: {}", path.display()))?;
            if texture.is_empty() {
                color_eyre::eyre::bail!("The {kind} input has no pixels: {}", path.display());
            }
            max_resolution = max_resolution.max(texture.resolution());
            Ok(texture)
        })?;

        for (kind, texture) in textures.iter() {
            if texture.resolution() != max_resolution {
                color_eyre::eyre::bail!(
                    "All inputs must share one resolution, but the {kind} input is {} and the \
                    largest input is {max_resolution}",
                    texture.resolution()
                );
            }
        }

        // For copying header data.
        let output = textures.albedo.clone();

        Ok(Self {
            textures,
            resolution: max_resolution,
            output,
        })
    }
}

#[cfg(test)]
pub mod test {
    use super::*;

    /// Write three uniform textures into a directory using the default names.
    pub fn write_inputs(directory: &std::path::Path, width: u32, height: u32) {
        let names = InputSet::<String>::default();
        let values = InputSet {
            albedo: [0.5, 0.5, 0.5, 1.0],
            color: [0.75, 0.25, 0.125, 1.0],
            normal: [0.0, 0.0, 1.0, 1.0],
        };
        for (kind, name) in names.iter() {
            crate::dds::header::test::uniform_rgba16(width, height, *values.get(kind))
                .write(&directory.join(name))
                .unwrap();
        }
    }

    #[test]
    fn load_all_inputs() {
        let directory = tempfile::tempdir().unwrap();
        write_inputs(directory.path(), 4, 2);
        let inputs = Inputs::load(directory.path(), &InputSet::default()).unwrap();
        assert_eq!(inputs.resolution.width, 4);
        assert_eq!(inputs.resolution.height, 2);
        assert_eq!(inputs.output.raw_header, inputs.textures.albedo.raw_header);
        assert_eq!(inputs.output.data, inputs.textures.albedo.data);
    }

    #[test]
    fn missing_input() {
        let directory = tempfile::tempdir().unwrap();
        write_inputs(directory.path(), 4, 2);
        std::fs::remove_file(directory.path().join(DEFAULT_NORMAL)).unwrap();
        let error = Inputs::load(directory.path(), &InputSet::default()).unwrap_err();
        assert!(error.to_string().contains("normal"));
    }

    #[test]
    fn empty_input() {
        let directory = tempfile::tempdir().unwrap();
        write_inputs(directory.path(), 4, 2);
        std::fs::write(directory.path().join(DEFAULT_COLOR), []).unwrap();
        assert!(Inputs::load(directory.path(), &InputSet::default()).is_err());
    }

    #[test]
    fn mismatched_resolutions() {
        let directory = tempfile::tempdir().unwrap();
        write_inputs(directory.path(), 4, 2);
        crate::dds::header::test::uniform_rgba16(8, 2, [0.0; 4])
            .write(&directory.path().join(DEFAULT_COLOR))
            .unwrap();
        let error = Inputs::load(directory.path(), &InputSet::default()).unwrap_err();
        assert!(error.to_string().contains("one resolution"));
    }

    #[test]
    fn kinds_are_ordered() {
        let set = InputSet {
            albedo: 'a',
            color: 'c',
            normal: 'n',
        };
        let order: Vec<char> = set.iter().map(|(_, value)| *value).collect();
        assert_eq!(order, ['a', 'c', 'n']);
        assert_eq!(InputKind::Normal.index(), 2);
    }
}
