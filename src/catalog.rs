// src/catalog.rs

//! Static stage catalog: the pipeline's rule table.
//!
//! Each [`StageDef`] declares templated input/output paths, a shell command
//! template and a default CPU slot cost. Templates use `{sample}` for the
//! sample token and flat config keys like `{root}`, `{folders.assemblies}`,
//! `{cores.megahit}` or `{params.completeness}`; command templates may also
//! reference `{input}` / `{output}` (space-joined) and `{input.N}` /
//! `{output.N}` (indexed). See [`crate::resolve`].
//!
//! The catalog is built once at startup and shared read-only; its declaration
//! order defines the dispatch tie-break priority.

use crate::config::PipelineConfig;

/// One named unit of work with declared input/output path templates and a
/// command template.
#[derive(Debug, Clone)]
pub struct StageDef {
    pub name: String,
    /// Ordered input path templates.
    pub inputs: Vec<String>,
    /// Ordered output path templates.
    pub outputs: Vec<String>,
    /// Shell command template, run inside a private scratch directory.
    pub command: String,
    /// CPU slots claimed when no `[cores.<name>]` override is configured.
    pub default_cost: u32,
}

impl StageDef {
    pub fn new(
        name: &str,
        inputs: &[&str],
        outputs: &[&str],
        command: &str,
        default_cost: u32,
    ) -> Self {
        Self {
            name: name.to_string(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            command: command.to_string(),
            default_cost,
        }
    }

    /// Effective CPU slot cost under the given configuration.
    pub fn cost(&self, cfg: &PipelineConfig) -> u32 {
        cfg.cores
            .get(&self.name)
            .copied()
            .unwrap_or(self.default_cost)
            .max(1)
    }
}

/// Read-only table of stage definitions, ordered by dispatch priority.
#[derive(Debug, Clone)]
pub struct StageCatalog {
    stages: Vec<StageDef>,
}

impl StageCatalog {
    pub fn new(stages: Vec<StageDef>) -> Self {
        Self { stages }
    }

    pub fn stages(&self) -> &[StageDef] {
        &self.stages
    }

    pub fn get(&self, name: &str) -> Option<&StageDef> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Position of a stage in the catalog; used as the first dispatch
    /// tie-break key.
    pub fn priority(&self, name: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// The metaGEM stage set: quality filtering, assembly, three independent
/// binners, refinement, reassembly, abundance mapping, taxonomic
/// classification, GEM reconstruction and validation, and community
/// simulation.
pub fn builtin_catalog() -> StageCatalog {
    let stages = vec![
        StageDef::new(
            "qfilter",
            &["{root}/{folders.data}/{sample}/{sample}.fastq.gz"],
            &["{root}/{folders.qfiltered}/{sample}/{sample}.fastq.gz"],
            "fastp --thread {cores.qfilter} -i {input.0} -o {output.0} \
             -j {sample}.json -h {sample}.html",
            4,
        ),
        StageDef::new(
            "megahit",
            &["{root}/{folders.qfiltered}/{sample}/{sample}.fastq.gz"],
            &["{root}/{folders.assemblies}/{sample}/contigs.fasta.gz"],
            "megahit -t {cores.megahit} --verbose -r {input.0} -o tmp && \
             sed 's/ /-/g' tmp/final.contigs.fa | gzip > {output.0}",
            24,
        ),
        StageDef::new(
            "metabat",
            &[
                "{root}/{folders.assemblies}/{sample}/contigs.fasta.gz",
                "{root}/{folders.qfiltered}/{sample}/{sample}.fastq.gz",
            ],
            &["{root}/{folders.metabat}/{sample}/{sample}.metabat-bins"],
            "mkdir -p {output.0} && \
             gunzip -c {input.0} > contigs.fasta && \
             bwa index contigs.fasta && \
             bwa mem -t {cores.metabat} contigs.fasta {input.1} | \
             samtools sort -@ {cores.metabat} -o {sample}.bam - && \
             jgi_summarize_bam_contig_depths --outputDepth depth.txt {sample}.bam && \
             metabat2 -i contigs.fasta -a depth.txt -s {params.min_bin_length} \
             -t {cores.metabat} -o {output.0}/{sample}.bin",
            16,
        ),
        StageDef::new(
            "maxbin",
            &[
                "{root}/{folders.assemblies}/{sample}/contigs.fasta.gz",
                "{root}/{folders.qfiltered}/{sample}/{sample}.fastq.gz",
            ],
            &["{root}/{folders.maxbin}/{sample}/{sample}.maxbin-bins"],
            "mkdir -p {output.0} && \
             gunzip -c {input.0} > contigs.fasta && \
             run_MaxBin.pl -contig contigs.fasta -reads {input.1} \
             -thread {cores.maxbin} -out {output.0}/{sample}.maxbin",
            16,
        ),
        StageDef::new(
            "concoct",
            &[
                "{root}/{folders.assemblies}/{sample}/contigs.fasta.gz",
                "{root}/{folders.qfiltered}/{sample}/{sample}.fastq.gz",
            ],
            &["{root}/{folders.concoct}/{sample}/{sample}.concoct-bins"],
            "mkdir -p {output.0} && \
             gunzip -c {input.0} > contigs.fasta && \
             cut_up_fasta.py contigs.fasta -c {params.cut_chunk_size} \
             -b contigs_cut.bed -m > contigs_cut.fa && \
             bwa index contigs_cut.fa && \
             bwa mem -t {cores.concoct} contigs_cut.fa {input.1} | \
             samtools sort -@ {cores.concoct} -o {sample}.bam - && \
             samtools index {sample}.bam && \
             concoct_coverage_table.py contigs_cut.bed {sample}.bam > coverage_table.tsv && \
             concoct --composition_file contigs_cut.fa --coverage_file coverage_table.tsv \
             -t {cores.concoct} -b {sample} && \
             merge_cutup_clustering.py {sample}_clustering_gt1000.csv > {sample}_merged.csv && \
             extract_fasta_bins.py contigs.fasta {sample}_merged.csv --output_path {output.0}",
            16,
        ),
        StageDef::new(
            "bin_refine",
            &[
                "{root}/{folders.metabat}/{sample}/{sample}.metabat-bins",
                "{root}/{folders.maxbin}/{sample}/{sample}.maxbin-bins",
                "{root}/{folders.concoct}/{sample}/{sample}.concoct-bins",
            ],
            &["{root}/{folders.refined}/{sample}"],
            "metawrap bin_refinement -o {output.0} \
             -A {input.0} -B {input.1} -C {input.2} \
             -t {cores.bin_refine} -c {params.completeness} -x {params.contamination}",
            16,
        ),
        StageDef::new(
            "bin_reassemble",
            &[
                "{root}/{folders.refined}/{sample}",
                "{root}/{folders.qfiltered}/{sample}/{sample}.fastq.gz",
            ],
            &["{root}/{folders.reassembled}/{sample}"],
            "metawrap reassemble_bins -o {output.0} -b {input.0}/metawrap_bins \
             -1 {input.1} -2 {input.1} \
             -t {cores.bin_reassemble} -c {params.completeness} -x {params.contamination}",
            16,
        ),
        StageDef::new(
            "abundance",
            &[
                "{root}/{folders.reassembled}/{sample}",
                "{root}/{folders.qfiltered}/{sample}/{sample}.fastq.gz",
            ],
            &["{root}/{folders.abundance}/{sample}"],
            "mkdir -p {output.0} && \
             cat {input.0}/reassembled_bins/*.fa > {sample}.fa && \
             bwa index {sample}.fa && \
             bwa mem -t {cores.abundance} {sample}.fa {input.1} | \
             samtools sort -@ {cores.abundance} -o {sample}.bam - && \
             samtools flagstat {sample}.bam > {output.0}/{sample}_map.stats",
            8,
        ),
        StageDef::new(
            "gtdbtk",
            &["{root}/{folders.reassembled}/{sample}"],
            &["{root}/{folders.classification}/{sample}"],
            "gtdbtk classify_wf --genome_dir {input.0}/reassembled_bins \
             --out_dir {output.0} --cpus {cores.gtdbtk} -x fa",
            16,
        ),
        StageDef::new(
            "carveme",
            &["{root}/{folders.reassembled}/{sample}"],
            &["{root}/{folders.gems}/{sample}"],
            "mkdir -p {output.0} && \
             for bin in {input.0}/reassembled_bins/*.fa; do \
             carve --dna $bin -g {params.carve_media} --fbc2 \
             -o {output.0}/$(basename $bin .fa).xml; done",
            4,
        ),
        StageDef::new(
            "memote",
            &["{root}/{folders.gems}/{sample}"],
            &["{root}/{folders.memote}/{sample}"],
            "mkdir -p {output.0} && \
             for gem in {input.0}/*.xml; do \
             memote report snapshot --filename \
             {output.0}/$(basename $gem .xml).html $gem; done",
            4,
        ),
        StageDef::new(
            "smetana",
            &["{root}/{folders.gems}/{sample}"],
            &["{root}/{folders.smetana}/{sample}/{sample}_detailed.tsv"],
            "smetana -o {sample} --flavor fbc2 --detailed \
             --solver {params.smetana_solver} {input.0}/*.xml && \
             mv {sample}_detailed.tsv {output.0}",
            8,
        ),
    ];

    StageCatalog::new(stages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_has_unique_stage_names() {
        let catalog = builtin_catalog();
        let mut names: Vec<&str> = catalog.stages().iter().map(|s| s.name.as_str()).collect();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn priority_follows_declaration_order() {
        let catalog = builtin_catalog();
        assert_eq!(catalog.priority("qfilter"), Some(0));
        assert!(catalog.priority("megahit") < catalog.priority("smetana"));
        assert_eq!(catalog.priority("unknown"), None);
    }

    #[test]
    fn cost_prefers_config_override() {
        let catalog = builtin_catalog();
        let megahit = catalog.get("megahit").unwrap();

        let mut cfg: crate::config::PipelineConfig = toml::from_str(
            r#"
            [paths]
            root = "/data"
            "#,
        )
        .unwrap();
        assert_eq!(megahit.cost(&cfg), 24);

        cfg.cores.insert("megahit".to_string(), 48);
        assert_eq!(megahit.cost(&cfg), 48);
    }
}
