//! AWS SDK implementation of the cloud client
//!
//! The control plane is driven through the EKS API; worker nodes are
//! provisioned as a CloudFormation stack (node IAM role, launch template,
//! auto scaling group) whose `NodeInstanceRole` output feeds the aws-auth
//! ConfigMap.

use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_cloudformation::types::{Capability, Parameter};
use aws_sdk_eks::error::DisplayErrorContext;
use aws_sdk_eks::types::VpcConfigRequest;
use async_trait::async_trait;
use tracing::{debug, info};

use stratus_common::crd::{ClusterState, EksClusterSpec};
use stratus_common::AwsCredentials;

use crate::client::{Cluster, ClusterWorkers, EksClient};
use crate::error::CloudError;
use crate::token;

/// Stack output holding the ARN of the worker node instance role
const NODE_INSTANCE_ROLE_OUTPUT: &str = "NodeInstanceRole";

/// CloudFormation template for the worker node group.
///
/// Creates the node instance role, a launch template using the
/// EKS-optimized AMI resolved through SSM, and an auto scaling group
/// spanning the cluster subnets. The node role ARN is exported so the
/// controller can grant it access via aws-auth.
const NODE_GROUP_TEMPLATE: &str = r#"AWSTemplateFormatVersion: "2010-09-09"
Description: Stratus-managed EKS worker node group

Parameters:
  ClusterName:
    Type: String
  NodeGroupName:
    Type: String
  NodeInstanceType:
    Type: String
    Default: m5.large
  NodeAutoScalingGroupMinSize:
    Type: Number
    Default: 1
  NodeAutoScalingGroupMaxSize:
    Type: Number
    Default: 1
  NodeAutoScalingGroupDesiredCapacity:
    Type: Number
    Default: 1
  NodeImageId:
    Type: AWS::SSM::Parameter::Value<AWS::EC2::Image::Id>
    Default: /aws/service/eks/optimized-ami/1.32/amazon-linux-2023/x86_64/standard/recommended/image_id
  ClusterControlPlaneSecurityGroup:
    Type: String
  VpcId:
    Type: AWS::EC2::VPC::Id
  Subnets:
    Type: List<AWS::EC2::Subnet::Id>

Resources:
  NodeInstanceRole:
    Type: AWS::IAM::Role
    Properties:
      AssumeRolePolicyDocument:
        Version: "2012-10-17"
        Statement:
          - Effect: Allow
            Principal:
              Service: ec2.amazonaws.com
            Action: sts:AssumeRole
      ManagedPolicyArns:
        - arn:aws:iam::aws:policy/AmazonEKSWorkerNodePolicy
        - arn:aws:iam::aws:policy/AmazonEKS_CNI_Policy
        - arn:aws:iam::aws:policy/AmazonEC2ContainerRegistryReadOnly

  NodeInstanceProfile:
    Type: AWS::IAM::InstanceProfile
    Properties:
      Roles:
        - !Ref NodeInstanceRole

  NodeSecurityGroup:
    Type: AWS::EC2::SecurityGroup
    Properties:
      GroupDescription: Security group for all nodes in the cluster
      VpcId: !Ref VpcId
      Tags:
        - Key: !Sub kubernetes.io/cluster/${ClusterName}
          Value: owned

  NodeLaunchTemplate:
    Type: AWS::EC2::LaunchTemplate
    Properties:
      LaunchTemplateName: !Sub ${NodeGroupName}-lt
      LaunchTemplateData:
        ImageId: !Ref NodeImageId
        InstanceType: !Ref NodeInstanceType
        IamInstanceProfile:
          Arn: !GetAtt NodeInstanceProfile.Arn
        SecurityGroupIds:
          - !Ref NodeSecurityGroup
          - !Ref ClusterControlPlaneSecurityGroup
        UserData:
          Fn::Base64: !Sub |
            #!/bin/bash
            set -o xtrace
            /etc/eks/bootstrap.sh ${ClusterName}

  NodeGroup:
    Type: AWS::AutoScaling::AutoScalingGroup
    Properties:
      MinSize: !Ref NodeAutoScalingGroupMinSize
      MaxSize: !Ref NodeAutoScalingGroupMaxSize
      DesiredCapacity: !Ref NodeAutoScalingGroupDesiredCapacity
      LaunchTemplate:
        LaunchTemplateId: !Ref NodeLaunchTemplate
        Version: !GetAtt NodeLaunchTemplate.LatestVersionNumber
      VPCZoneIdentifier: !Ref Subnets
      Tags:
        - Key: Name
          Value: !Sub ${ClusterName}-node
          PropagateAtLaunch: true
        - Key: !Sub kubernetes.io/cluster/${ClusterName}
          Value: owned
          PropagateAtLaunch: true

Outputs:
  NodeInstanceRole:
    Description: ARN of the worker node instance role
    Value: !GetAtt NodeInstanceRole.Arn
"#;

/// Cloud client backed by the AWS SDK
pub struct AwsEksClient {
    eks: aws_sdk_eks::Client,
    cloudformation: aws_sdk_cloudformation::Client,
    credentials: Credentials,
    region: String,
}

impl AwsEksClient {
    /// Build a client for the given credentials and region
    pub async fn new(credentials: &AwsCredentials, region: &str) -> Self {
        let creds = Credentials::from_keys(
            credentials.access_key_id.clone(),
            (*credentials.secret_access_key).clone(),
            credentials.session_token.as_ref().map(|t| (**t).clone()),
        );

        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(creds.clone())
            .load()
            .await;

        Self {
            eks: aws_sdk_eks::Client::new(&config),
            cloudformation: aws_sdk_cloudformation::Client::new(&config),
            credentials: creds,
            region: region.to_string(),
        }
    }
}

fn parameter(key: &str, value: &str) -> Parameter {
    Parameter::builder()
        .parameter_key(key)
        .parameter_value(value)
        .build()
}

#[async_trait]
impl EksClient for AwsEksClient {
    async fn create_cluster(
        &self,
        cluster_name: &str,
        spec: &EksClusterSpec,
    ) -> Result<Cluster, CloudError> {
        info!(cluster = %cluster_name, region = %self.region, "creating EKS control plane");

        let vpc_config = VpcConfigRequest::builder()
            .set_subnet_ids(Some(spec.subnets.clone()))
            .set_security_group_ids(Some(spec.security_groups.clone()))
            .build();

        match self
            .eks
            .create_cluster()
            .name(cluster_name)
            .role_arn(&spec.role_arn)
            .version(&spec.version)
            .resources_vpc_config(vpc_config)
            .send()
            .await
        {
            Ok(_) => Ok(Cluster::default()),
            Err(e) => {
                let terminal = matches!(
                    e.as_service_error(),
                    Some(se) if se.is_invalid_parameter_exception()
                );
                let message = format!("{}", DisplayErrorContext(&e));
                Err(if terminal {
                    CloudError::bad_request(message)
                } else {
                    CloudError::other(message)
                })
            }
        }
    }

    async fn get_cluster(&self, cluster_name: &str) -> Result<Cluster, CloudError> {
        match self.eks.describe_cluster().name(cluster_name).send().await {
            Ok(resp) => {
                let cluster = resp.cluster.ok_or_else(|| {
                    CloudError::other("DescribeCluster response carried no cluster")
                })?;
                Ok(Cluster {
                    state: cluster
                        .status
                        .as_ref()
                        .map(|s| ClusterState::from_api(s.as_str()))
                        .unwrap_or_default(),
                    endpoint: cluster.endpoint.unwrap_or_default(),
                    certificate_authority_data: cluster
                        .certificate_authority
                        .and_then(|ca| ca.data)
                        .unwrap_or_default(),
                })
            }
            Err(e) => {
                let not_found = matches!(
                    e.as_service_error(),
                    Some(se) if se.is_resource_not_found_exception()
                );
                let message = format!("{}", DisplayErrorContext(&e));
                Err(if not_found {
                    CloudError::not_found(message)
                } else {
                    CloudError::other(message)
                })
            }
        }
    }

    async fn create_worker_nodes(
        &self,
        cluster_name: &str,
        role_arn: &str,
        spec: &EksClusterSpec,
    ) -> Result<ClusterWorkers, CloudError> {
        let stack_name = format!("{cluster_name}-workers");
        let workers_count = spec.workers_count.to_string();
        info!(cluster = %cluster_name, stack = %stack_name, "creating worker node stack");

        let mut request = self
            .cloudformation
            .create_stack()
            .stack_name(&stack_name)
            .template_body(NODE_GROUP_TEMPLATE)
            .capabilities(Capability::CapabilityIam)
            .parameters(parameter("ClusterName", cluster_name))
            .parameters(parameter("NodeGroupName", &stack_name))
            .parameters(parameter(
                "NodeInstanceType",
                &spec.worker_nodes_instance_type,
            ))
            .parameters(parameter("NodeAutoScalingGroupMinSize", &workers_count))
            .parameters(parameter("NodeAutoScalingGroupMaxSize", &workers_count))
            .parameters(parameter(
                "NodeAutoScalingGroupDesiredCapacity",
                &workers_count,
            ))
            .parameters(parameter("VpcId", &spec.vpc_id))
            .parameters(parameter("Subnets", &spec.subnets.join(",")))
            .parameters(parameter(
                "ClusterControlPlaneSecurityGroup",
                &spec.security_groups.join(","),
            ));
        if !role_arn.is_empty() {
            request = request.role_arn(role_arn);
        }

        match request.send().await {
            Ok(resp) => Ok(ClusterWorkers {
                worker_stack_id: resp.stack_id.unwrap_or_default(),
                ..Default::default()
            }),
            Err(e) => Err(CloudError::other(format!("{}", DisplayErrorContext(&e)))),
        }
    }

    async fn get_worker_nodes(&self, stack_id: &str) -> Result<ClusterWorkers, CloudError> {
        match self
            .cloudformation
            .describe_stacks()
            .stack_name(stack_id)
            .send()
            .await
        {
            Ok(resp) => {
                let stack = resp
                    .stacks
                    .unwrap_or_default()
                    .into_iter()
                    .next()
                    .ok_or_else(|| {
                        CloudError::not_found(format!("stack {stack_id} does not exist"))
                    })?;

                let mut workers = ClusterWorkers {
                    worker_stack_id: stack.stack_id.unwrap_or_else(|| stack_id.to_string()),
                    workers_status: stack
                        .stack_status
                        .as_ref()
                        .map(|s| s.as_str().to_string())
                        .unwrap_or_default(),
                    worker_reason: stack.stack_status_reason.unwrap_or_default(),
                    worker_arn: String::new(),
                };

                // The node role ARN is only trustworthy once the stack has
                // finished rolling out.
                if workers.is_complete() {
                    workers.worker_arn = stack
                        .outputs
                        .unwrap_or_default()
                        .into_iter()
                        .find(|o| o.output_key.as_deref() == Some(NODE_INSTANCE_ROLE_OUTPUT))
                        .and_then(|o| o.output_value)
                        .unwrap_or_default();
                }

                Ok(workers)
            }
            Err(e) => Err(CloudError::other(format!("{}", DisplayErrorContext(&e)))),
        }
    }

    async fn delete_cluster(&self, cluster_name: &str) -> Result<(), CloudError> {
        match self.eks.delete_cluster().name(cluster_name).send().await {
            Ok(_) => Ok(()),
            Err(e) => {
                if matches!(
                    e.as_service_error(),
                    Some(se) if se.is_resource_not_found_exception()
                ) {
                    debug!(cluster = %cluster_name, "control plane already gone");
                    return Ok(());
                }
                Err(CloudError::other(format!("{}", DisplayErrorContext(&e))))
            }
        }
    }

    async fn delete_worker_nodes(&self, stack_id: &str) -> Result<(), CloudError> {
        match self
            .cloudformation
            .delete_stack()
            .stack_name(stack_id)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                let message = format!("{}", DisplayErrorContext(&e));
                if message.contains("does not exist") {
                    debug!(stack = %stack_id, "worker stack already gone");
                    return Ok(());
                }
                Err(CloudError::other(message))
            }
        }
    }

    async fn connection_token(&self, cluster_name: &str) -> Result<String, CloudError> {
        token::presigned_token(self.credentials.clone(), &self.region, cluster_name)
    }
}
