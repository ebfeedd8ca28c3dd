//! Sample CV page for testing and demonstration.
//!
//! Exercises everything the pipeline cares about: the export container, a
//! `no-print` control, compaction-target sections, break-avoid item groups,
//! and a data-URI image.

/// 1×1 PNG, inlined so the sample needs no files on disk.
pub const AVATAR_DATA_URI: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8BQDwAEhQGAhKmMIQAAAABJRU5ErkJggg==";

/// A complete CV page in the markup shape the exporter expects.
pub fn sample_cv() -> String {
    format!(
        r##"<!DOCTYPE html>
<html>
<head><title>Guillermo Caminero - CV</title></head>
<body>
<div id="cv-content">
    <section class="py-12 px-4 bg-gray-50">
        <div class="max-w-7xl">
            <img src="{avatar}" style="width: 96px; height: 96px">
            <h1 class="text-4xl font-bold text-gray-900">Guillermo Caminero</h1>
            <p class="text-lg text-gray-600">Senior Software Engineer</p>
            <button class="no-print">Download PDF</button>
        </div>
    </section>

    <section id="about-section" class="py-12 px-4">
        <div class="max-w-7xl">
            <h2 class="text-2xl font-bold mb-6">About Me</h2>
            <div class="bg-white p-8 mb-6">
                <p>Software engineer with a decade of experience building
                backend services and data pipelines. Comfortable across the
                stack, happiest close to the metal.</p>
                <p>Based in Madrid. Open to remote work.</p>
            </div>
        </div>
    </section>

    <section class="py-12 px-4">
        <div class="max-w-7xl">
            <h2 class="text-2xl font-bold mb-6">Work Experience</h2>
            <div class="space-y-8">
                <div class="work-experience-item bg-white p-8">
                    <h3 class="text-xl font-bold">Staff Engineer - Acme Corp</h3>
                    <p class="text-sm text-gray-500">2021 - Present</p>
                    <ul class="mt-4">
                        <li>Led the migration of the billing platform to an event-driven architecture.</li>
                        <li>Cut p99 request latency by 40 percent through cache redesign.</li>
                    </ul>
                </div>
                <div class="work-experience-item bg-white p-8">
                    <h3 class="text-xl font-bold">Backend Engineer - Widget Labs</h3>
                    <p class="text-sm text-gray-500">2017 - 2021</p>
                    <ul class="mt-4">
                        <li>Built the ingestion pipeline handling two million events per hour.</li>
                        <li>Owned the on-call rotation tooling used by four teams.</li>
                    </ul>
                </div>
            </div>
        </div>
    </section>

    <section class="py-12 px-4">
        <div class="max-w-7xl">
            <h2 class="text-2xl font-bold mb-6">Education</h2>
            <div class="space-y-6">
                <div class="education-item bg-white p-8">
                    <h3 class="text-lg font-bold">MSc Computer Science</h3>
                    <p class="text-gray-600 pb-4">Universidad Polit&eacute;cnica de Madrid, 2015</p>
                </div>
            </div>
        </div>
    </section>

    <section class="py-12 px-4">
        <div class="max-w-7xl">
            <h2 class="text-2xl font-bold mb-6">Certifications</h2>
            <div class="certification-item bg-white p-8">
                <p class="font-bold">AWS Solutions Architect - Professional</p>
                <p class="text-sm text-gray-500">Valid through 2026</p>
            </div>
        </div>
    </section>
</div>
</body>
</html>
"##,
        avatar = AVATAR_DATA_URI
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{find_by_id, parse_html};

    #[test]
    fn sample_has_export_container() {
        let nodes = parse_html(&sample_cv());
        assert!(find_by_id(&nodes, "cv-content").is_some());
    }

    #[test]
    fn sample_avatar_is_a_data_uri() {
        assert!(AVATAR_DATA_URI.starts_with("data:image/png;base64,"));
    }
}
