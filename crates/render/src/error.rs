use blendlab_assets::AssetError;
use blendlab_common::{RenderTargetId, TextureId};

/// Errors from rendering operations.
///
/// `ResourceLoad` and `Device` are fatal at startup. The batch-state
/// variants and `NotLoaded` indicate caller misuse of load/begin/draw/end
/// ordering.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("resource load failed: {0}")]
    ResourceLoad(#[from] AssetError),
    #[error("graphics device error: {0}")]
    Device(String),
    #[error("begin called while a batch is already active")]
    BatchAlreadyActive,
    #[error("{0} called without an active batch")]
    BatchNotActive(&'static str),
    #[error("{0} used before load")]
    NotLoaded(&'static str),
    #[error("unknown texture: {0:?}")]
    UnknownTexture(TextureId),
    #[error("unknown render target: {0:?}")]
    UnknownRenderTarget(RenderTargetId),
}

impl RenderError {
    pub fn device(msg: impl Into<String>) -> Self {
        Self::Device(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_errors_convert() {
        let err: RenderError = AssetError::NotFound {
            name: "test".into(),
            root: "Content".into(),
        }
        .into();
        assert!(matches!(err, RenderError::ResourceLoad(_)));
        assert!(err.to_string().contains("resource load failed"));
    }

    #[test]
    fn batch_errors_name_the_operation() {
        assert!(
            RenderError::BatchNotActive("draw")
                .to_string()
                .starts_with("draw called")
        );
    }

    #[test]
    fn not_loaded_names_the_resource() {
        let err = RenderError::NotLoaded("sprite storm texture");
        assert_eq!(err.to_string(), "sprite storm texture used before load");
        assert!(!matches!(err, RenderError::Device(_)));
    }
}
