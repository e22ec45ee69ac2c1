use serde::{Deserialize, Serialize};
use tundra_common::PartialRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangePartitionBound {
    Inclusive,
    Exclusive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashPartition {
    pub columns: Vec<String>,
    pub buckets: u32,
}

/// One range partition. A bound row with no columns set is unbounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangePartition {
    pub lower: PartialRow,
    pub upper: PartialRow,
    pub lower_bound: RangePartitionBound,
    pub upper_bound: RangePartitionBound,
}

/// Partitioning and replication of a table about to be created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTableOptions {
    num_replicas: u32,
    hash_partitions: Vec<HashPartition>,
    range_partition_columns: Vec<String>,
    range_partitions: Vec<RangePartition>,
}

impl Default for CreateTableOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl CreateTableOptions {
    pub fn new() -> Self {
        Self {
            num_replicas: 1,
            hash_partitions: Vec::new(),
            range_partition_columns: Vec::new(),
            range_partitions: Vec::new(),
        }
    }

    pub fn set_num_replicas(&mut self, num_replicas: u32) -> &mut Self {
        self.num_replicas = num_replicas;
        self
    }

    pub fn add_hash_partitions(&mut self, columns: Vec<String>, buckets: u32) -> &mut Self {
        self.hash_partitions.push(HashPartition { columns, buckets });
        self
    }

    pub fn set_range_partition_columns(&mut self, columns: Vec<String>) -> &mut Self {
        self.range_partition_columns = columns;
        self
    }

    pub fn add_range_partition(
        &mut self,
        lower: PartialRow,
        upper: PartialRow,
        lower_bound: RangePartitionBound,
        upper_bound: RangePartitionBound,
    ) -> &mut Self {
        self.range_partitions.push(RangePartition { lower, upper, lower_bound, upper_bound });
        self
    }

    pub fn num_replicas(&self) -> u32 {
        self.num_replicas
    }

    pub fn hash_partitions(&self) -> &[HashPartition] {
        &self.hash_partitions
    }

    pub fn range_partition_columns(&self) -> &[String] {
        &self.range_partition_columns
    }

    pub fn range_partitions(&self) -> &[RangePartition] {
        &self.range_partitions
    }
}
