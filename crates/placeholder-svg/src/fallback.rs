//! Broken-image fallback

use crate::error::{ElementError, Result};
use crate::placeholder::{Placeholder, BACKGROUND_COLOR};
use std::sync::OnceLock;
use tracing::debug;

const SWEEP_SIZE: u32 = 400;
const SWEEP_LABEL: &str = "Product";

/// An image element the fallback can patch.
///
/// Setters are fallible because the element may have left its document.
pub trait ImageTarget {
    fn src(&self) -> &str;
    fn alt(&self) -> Option<&str>;
    /// Whether the browser finished loading the current source
    fn is_complete(&self) -> bool;
    fn natural_height(&self) -> u32;
    fn clear_error_handler(&mut self) -> Result<()>;
    fn set_src(&mut self, src: &str) -> Result<()>;
    fn set_alt(&mut self, alt: &str) -> Result<()>;
    fn set_background(&mut self, color: &str) -> Result<()>;
}

/// Plain image element state, as seen by the fallback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageElement {
    pub src: String,
    pub alt: Option<String>,
    /// Inline failure handler, e.g. `imgFallback(this)`
    pub on_error: Option<String>,
    pub background_color: Option<String>,
    pub complete: bool,
    pub natural_height: u32,
    pub attached: bool,
}

impl ImageElement {
    /// An attached element that has not loaded yet
    pub fn new(src: &str) -> Self {
        Self {
            src: src.to_string(),
            alt: None,
            on_error: None,
            background_color: None,
            complete: false,
            natural_height: 0,
            attached: true,
        }
    }

    /// Mark the element as loaded with the given intrinsic height
    pub fn loaded(mut self, natural_height: u32) -> Self {
        self.complete = true;
        self.natural_height = natural_height;
        self
    }

    fn ensure_attached(&self) -> Result<()> {
        if self.attached {
            Ok(())
        } else {
            Err(ElementError::Detached)
        }
    }
}

impl ImageTarget for ImageElement {
    fn src(&self) -> &str {
        &self.src
    }

    fn alt(&self) -> Option<&str> {
        self.alt.as_deref()
    }

    fn is_complete(&self) -> bool {
        self.complete
    }

    fn natural_height(&self) -> u32 {
        self.natural_height
    }

    fn clear_error_handler(&mut self) -> Result<()> {
        self.ensure_attached()?;
        self.on_error = None;
        Ok(())
    }

    fn set_src(&mut self, src: &str) -> Result<()> {
        self.ensure_attached()?;
        self.src = src.to_string();
        Ok(())
    }

    fn set_alt(&mut self, alt: &str) -> Result<()> {
        self.ensure_attached()?;
        self.alt = Some(alt.to_string());
        Ok(())
    }

    fn set_background(&mut self, color: &str) -> Result<()> {
        self.ensure_attached()?;
        self.background_color = Some(color.to_string());
        Ok(())
    }
}

/// Swaps a generated placeholder into images that failed to load
#[derive(Debug, Clone)]
pub struct FallbackInstaller {
    sweep_size: u32,
    sweep_label: String,
}

impl Default for FallbackInstaller {
    fn default() -> Self {
        Self {
            sweep_size: SWEEP_SIZE,
            sweep_label: SWEEP_LABEL.to_string(),
        }
    }
}

impl FallbackInstaller {
    /// Replace the element's source with a placeholder.
    ///
    /// Does nothing for `None`. Errors from the element are swallowed: a
    /// broken image must never take the page down with it.
    pub fn apply<T: ImageTarget + ?Sized>(
        &self,
        element: Option<&mut T>,
        width: Option<u32>,
        height: Option<u32>,
        label: Option<&str>,
    ) {
        if let Some(element) = element {
            self.try_apply(element, width, height, label);
        }
    }

    /// Patch the element, returning whether every change was applied
    fn try_apply<T: ImageTarget + ?Sized>(
        &self,
        element: &mut T,
        width: Option<u32>,
        height: Option<u32>,
        label: Option<&str>,
    ) -> bool {
        let placeholder = Placeholder::new(width, height, label);
        match patch(element, &placeholder) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "Image fallback skipped");
                false
            }
        }
    }

    /// One pass over the page's images after load, patching every image
    /// that is incomplete or has no intrinsic height. Returns how many were
    /// patched.
    pub fn sweep<'a, T, I>(&self, images: I) -> usize
    where
        T: ImageTarget + ?Sized + 'a,
        I: IntoIterator<Item = &'a mut T>,
    {
        let mut patched = 0;
        for image in images {
            if image.is_complete() && image.natural_height() > 0 {
                continue;
            }
            debug!(src = %image.src(), "Image did not load, applying fallback");
            if self.try_apply(
                image,
                Some(self.sweep_size),
                Some(self.sweep_size),
                Some(&self.sweep_label),
            ) {
                patched += 1;
            }
        }
        patched
    }
}

fn patch<T: ImageTarget + ?Sized>(element: &mut T, placeholder: &Placeholder) -> Result<()> {
    // Cleared first so a failing placeholder cannot re-trigger the handler
    element.clear_error_handler()?;
    element.set_src(&placeholder.to_data_uri())?;
    if element.alt().map_or(true, str::is_empty) {
        element.set_alt(placeholder.label())?;
    }
    element.set_background(BACKGROUND_COLOR)?;
    Ok(())
}

/// The process-wide installer, created on first use
pub fn install() -> &'static FallbackInstaller {
    static INSTALLER: OnceLock<FallbackInstaller> = OnceLock::new();
    INSTALLER.get_or_init(|| {
        debug!("Image fallback installed");
        FallbackInstaller::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placeholder::generate;

    fn broken() -> ImageElement {
        let mut element = ImageElement::new("/static/img/produtos/missing.jpg");
        element.on_error = Some("imgFallback(this, 300, 300, 'Camiseta')".to_string());
        element
    }

    #[test]
    fn test_apply_patches_element() {
        let mut element = broken();
        install().apply(Some(&mut element), Some(300), Some(300), Some("Camiseta"));

        assert_eq!(element.src, generate(Some(300), Some(300), Some("Camiseta")));
        assert_eq!(element.alt.as_deref(), Some("Camiseta"));
        assert!(element.on_error.is_none());
        assert_eq!(element.background_color.as_deref(), Some(BACKGROUND_COLOR));
    }

    #[test]
    fn test_apply_keeps_existing_alt() {
        let mut element = broken();
        element.alt = Some("Blue shirt".to_string());
        install().apply(Some(&mut element), None, None, None);

        assert_eq!(element.alt.as_deref(), Some("Blue shirt"));
        assert_eq!(element.src, generate(None, None, None));
    }

    #[test]
    fn test_apply_replaces_empty_alt() {
        let mut element = broken();
        element.alt = Some(String::new());
        install().apply(Some(&mut element), None, None, None);
        assert_eq!(element.alt.as_deref(), Some("No Image"));
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut once = broken();
        install().apply(Some(&mut once), Some(120), Some(90), Some("Tênis"));

        let mut twice = broken();
        install().apply(Some(&mut twice), Some(120), Some(90), Some("Tênis"));
        install().apply(Some(&mut twice), Some(120), Some(90), Some("Tênis"));

        assert_eq!(once, twice);
    }

    #[test]
    fn test_apply_without_element_is_noop() {
        install().apply(None::<&mut ImageElement>, Some(10), Some(10), Some("x"));
    }

    #[test]
    fn test_detached_element_is_swallowed() {
        let mut element = broken();
        element.attached = false;
        let before = element.clone();

        install().apply(Some(&mut element), None, None, None);
        assert_eq!(element, before);
    }

    #[test]
    fn test_install_returns_same_instance() {
        assert!(std::ptr::eq(install(), install()));
    }

    #[test]
    fn test_sweep_patches_only_failed_images() {
        let mut images = vec![
            ImageElement::new("/static/a.jpg").loaded(480),
            ImageElement::new("/static/b.jpg").loaded(0),
            ImageElement::new("/static/c.jpg"),
        ];

        let patched = install().sweep(images.iter_mut());

        assert_eq!(patched, 2);
        assert_eq!(images[0].src, "/static/a.jpg");
        let expected = generate(Some(400), Some(400), Some("Product"));
        assert_eq!(images[1].src, expected);
        assert_eq!(images[2].src, expected);
        assert_eq!(images[2].alt.as_deref(), Some("Product"));
    }

    #[test]
    fn test_sweep_tolerates_detached_images() {
        let mut detached = ImageElement::new("/static/gone.jpg");
        detached.attached = false;
        let mut images = vec![detached, ImageElement::new("/static/d.jpg")];

        let patched = install().sweep(images.iter_mut());
        assert_eq!(patched, 1);
        assert_eq!(images[0].src, "/static/gone.jpg");
        assert!(images[1].src.starts_with("data:image/svg+xml"));
    }

    #[test]
    fn test_sweep_of_only_detached_images_patches_nothing() {
        let mut detached = ImageElement::new("/static/gone.jpg");
        detached.attached = false;
        let mut images = vec![detached];

        assert_eq!(install().sweep(images.iter_mut()), 0);
        assert_eq!(images[0].src, "/static/gone.jpg");
    }
}
