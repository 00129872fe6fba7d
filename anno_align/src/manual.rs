/*!

This is the long-form manual for `anno_align` and `crowdanno`.

## Input files

### Shuffle-order mapping

One CSV file per corpus. The header row names one document per column (after
the first); each of the four data rows describes one shuffled slot, and its
cells hold the 1-based index of the system sitting at that slot for that
document:

|        | 1 | 2 | 3 | ... |
|--------|---|---|---|-----|
| slot 1 | 3 | 1 | 4 |     |
| slot 2 | 1 | 2 | 3 |     |
| slot 3 | 4 | 4 | 2 |     |
| slot 4 | 2 | 3 | 1 |     |

Cells may be left empty while the file is being assembled, but the pipeline
refuses to resolve anything until every document populates all four slots
with a permutation of the system indices.

### Raw exports

One CSV file per annotation batch, named `<marker><start>-<end>.csv`
(for example `Likert 21-30.csv` or `BWS 1-10.csv`); the start number is the
first document covered by the batch. The first row is a header. Every other
row is one annotator: 3 leading metadata columns (the second one is the
worker id), the answer columns, and a trailing free-text comment column.
Some exports drop one leading column and the comment column; this layout is
detected from the row width and handled transparently.

* Likert batches carry one integer rating per (document, slot), 4 columns per
  document. An empty rating cell is tolerated and reported as a diagnostic.
* BWS batches carry one (best, worst) column pair per document; the last
  character of each cell is the slot digit that was picked. Empty cells are
  an error here.

## Configuration

The alignment run is described by a JSON file:

```json
{
    "corpusName": "cnndm",
    "scheme": "likert",
    "annotationDirectory": "annotation/likert_10_csv_cnn",
    "mappingFile": "shuffle_order/question_mapping_cnn.csv",
    "outputPath": "final_result/cnndm.likert_10.csv",
    "factsPath": "final_result/cnndm.likert_10.facts.json",
    "systems": ["pegasus", "prophetnet", "bart", "bertextabs"]
}
```

`documentCount` (100), `chunkSize` (5), `annotatorsPerChunk` (3) and
`fileMarker` (derived from the scheme) can be overridden.

## Consistency comparison

Two facts dumps produced by alignment runs (an original pass and a redo pass)
can be joined by worker identity:

```bash
crowdanno --original likert_output.json --redo likert_output_redo.json \
    --scheme likert --metrics-out likert_average_diff.json
```

The metric is the mean absolute rating difference per worker for Likert, and
the best/worst mismatch rate per worker for BWS, plus the overall mean.

*/
